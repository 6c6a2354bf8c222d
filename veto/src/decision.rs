/// A single voter's verdict on a (context, action) pair
///
/// A definite verdict ([`Allow`][Decision::Allow] or
/// [`Deny`][Decision::Deny]) ends the evaluation immediately; an abstention
/// defers to the next voter in registration order.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
#[must_use]
pub enum Decision {
    /// A definite vote to permit the action
    Allow,
    /// A definite vote to reject the action
    Deny,
    /// No vote; defer to the next voter in order
    Abstain,
}

impl Decision {
    /// Whether this verdict ends the evaluation
    #[inline]
    pub fn is_definite(&self) -> bool {
        !matches!(self, Decision::Abstain)
    }

    /// The verdict as a boolean, or `None` for an abstention
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Decision::Allow => Some(true),
            Decision::Deny => Some(false),
            Decision::Abstain => None,
        }
    }
}

impl From<bool> for Decision {
    #[inline]
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

impl From<Option<bool>> for Decision {
    #[inline]
    fn from(vote: Option<bool>) -> Self {
        match vote {
            Some(allowed) => Decision::from(allowed),
            None => Decision::Abstain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_are_definite_votes() {
        assert_eq!(Decision::from(true), Decision::Allow);
        assert_eq!(Decision::from(false), Decision::Deny);
        assert!(Decision::from(true).is_definite());
        assert!(Decision::from(false).is_definite());
    }

    #[test]
    fn missing_vote_is_an_abstention() {
        assert_eq!(Decision::from(None), Decision::Abstain);
        assert_eq!(Decision::from(Some(true)), Decision::Allow);
        assert!(!Decision::Abstain.is_definite());
    }

    #[test]
    fn as_bool_round_trips() {
        assert_eq!(Decision::Allow.as_bool(), Some(true));
        assert_eq!(Decision::Deny.as_bool(), Some(false));
        assert_eq!(Decision::Abstain.as_bool(), None);
    }
}
