use std::fmt;

/// Symmetrical-component sequence network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sequence {
    /// Zero sequence.
    Zero = 0,
    /// Positive sequence.
    Positive = 1,
    /// Negative sequence.
    Negative = 2,
}

impl Sequence {
    pub const ALL: [Sequence; 3] = [Sequence::Zero, Sequence::Positive, Sequence::Negative];

    /// Position of the sequence in `[seq0, seq1, seq2]` triples.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Zero => write!(f, "seq0"),
            Sequence::Positive => write!(f, "seq1"),
            Sequence::Negative => write!(f, "seq2"),
        }
    }
}

impl clap::ValueEnum for Sequence {
    fn value_variants<'a>() -> &'a [Self] {
        &Sequence::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(match self {
            Sequence::Zero => "seq0",
            Sequence::Positive => "seq1",
            Sequence::Negative => "seq2",
        }))
    }
}
