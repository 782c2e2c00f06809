use derive_more::Display;

/// Outcome of comparing a remote path with its local counterpart.
///
/// "Ahead" means "has content the other side lacks", not a time ordering.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Verdict {
    #[display("equal")]
    Equal,
    #[display("local-ahead")]
    LocalAhead,
    #[display("remote-ahead")]
    RemoteAhead,
    /// Not an answer: defer to the next strategy.
    #[display("indeterminate")]
    Indeterminate,
}

impl Verdict {
    pub fn is_conclusive(self) -> bool {
        self != Self::Indeterminate
    }
}
