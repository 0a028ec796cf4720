use serde::{Deserialize, Serialize};

/// A bounded unit of work delegated to the indexing service.
///
/// The set is closed on purpose: an action name the scheduler does not
/// recognise is rejected at the store boundary instead of being silently
/// skipped at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Submit a batch of project URLs for (re)indexing.
    Indexing,
    /// Inspect the index status of a batch of project URLs.
    Inspection,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::Indexing => "indexing",
            ActionKind::Inspection => "inspection",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "indexing" => Ok(ActionKind::Indexing),
            "inspection" => Ok(ActionKind::Inspection),
            other => Err(format!("unknown action kind: {other}")),
        }
    }
}
