//! Status row classification and aggregation.
//!
//! Classification is driven by [`RULES`], an ordered prefix table evaluated
//! first-match-wins. Keys matching no rule are ignored.

use crate::collector::mysql::fetch::StatusRow;

/// Destination of a classified status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Insert,
    Select,
    Show,
    Update,
    Other,
    Incoming,
    Outgoing,
    /// Matched, but deliberately not counted.
    Ignored,
}

/// One classification rule: keys starting with `prefix` go to `bucket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub prefix: &'static str,
    pub bucket: Bucket,
}

const fn rule(prefix: &'static str, bucket: Bucket) -> Rule {
    Rule { prefix, bucket }
}

/// Classification rules in precedence order.
///
/// `Com_stmt_*` are prepared-statement counters that duplicate the plain
/// command counters, so they must precede the `Com_` catch-all.
pub const RULES: &[Rule] = &[
    rule("Com_insert", Bucket::Insert),
    rule("Com_select", Bucket::Select),
    rule("Com_show", Bucket::Show),
    rule("Com_update", Bucket::Update),
    rule("Com_stmt_", Bucket::Ignored),
    rule("Com_", Bucket::Other),
    rule("Bytes_received", Bucket::Incoming),
    rule("Bytes_sent", Bucket::Outgoing),
];

/// Classify a status key. `None` means no rule matched.
pub fn classify(key: &str) -> Option<Bucket> {
    RULES
        .iter()
        .find(|r| key.starts_with(r.prefix))
        .map(|r| r.bucket)
}

/// Statement counters for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandCounters {
    pub insert: u64,
    pub select: u64,
    pub show: u64,
    pub update: u64,
    pub other: u64,
}

/// Byte counters for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficCounters {
    pub incoming: u64,
    pub outgoing: u64,
}

/// Sum every row into its bucket, starting from zero.
///
/// Duplicate keys are summed; additions saturate.
pub fn aggregate<'a>(
    rows: impl IntoIterator<Item = &'a StatusRow>,
) -> (CommandCounters, TrafficCounters) {
    let mut commands = CommandCounters::default();
    let mut traffic = TrafficCounters::default();

    for row in rows {
        let slot = match classify(&row.key) {
            Some(Bucket::Insert) => &mut commands.insert,
            Some(Bucket::Select) => &mut commands.select,
            Some(Bucket::Show) => &mut commands.show,
            Some(Bucket::Update) => &mut commands.update,
            Some(Bucket::Other) => &mut commands.other,
            Some(Bucket::Incoming) => &mut traffic.incoming,
            Some(Bucket::Outgoing) => &mut traffic.outgoing,
            Some(Bucket::Ignored) | None => continue,
        };
        *slot = slot.saturating_add(row.value);
    }

    (commands, traffic)
}
