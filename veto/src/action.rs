use aliri_braid::braid;
use thiserror::Error;

/// An invalid action name
#[derive(Clone, Copy, Debug, Error)]
pub enum InvalidActionName {
    /// The action name was the empty string
    #[error("action name cannot be empty")]
    EmptyString,
    /// The action name began with the path separator `/`
    #[error("action name can't start with `/`")]
    LeadingSlash,
}

impl From<std::convert::Infallible> for InvalidActionName {
    fn from(x: std::convert::Infallible) -> Self {
        match x {}
    }
}

/// The name of a guarded capability, such as `access admin page`
///
/// An action name is an arbitrary non-empty string. It must not begin with
/// `/`: a leading slash almost always means a route path was passed where an
/// action name was intended, and routing is the router's concern, not the
/// decision engine's.
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to an [`ActionName`]"
)]
pub struct ActionName;

impl aliri_braid::Validator for ActionName {
    type Error = InvalidActionName;

    /// Validates that the action name is non-empty and is not a route path
    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidActionName::EmptyString)
        } else if s.starts_with('/') {
            Err(InvalidActionName::LeadingSlash)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_name_is_accepted() {
        let x = ActionName::new("view admin page".to_string());
        assert!(x.is_ok());
    }

    #[test]
    fn name_with_interior_slash_is_accepted() {
        let x = ActionName::new("posts/create".to_string());
        assert!(x.is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let x = ActionName::new("".to_string());
        assert!(matches!(x, Err(InvalidActionName::EmptyString)));
    }

    #[test]
    fn route_path_is_rejected() {
        let x = ActionName::new("/foo".to_string());
        assert!(matches!(x, Err(InvalidActionName::LeadingSlash)));
    }

    #[test]
    fn borrowed_form_applies_the_same_rules() {
        assert!(ActionNameRef::from_str("view admin page").is_ok());
        assert!(matches!(
            ActionNameRef::from_str("/foo"),
            Err(InvalidActionName::LeadingSlash)
        ));
    }

    #[test]
    fn rejection_is_a_plain_value() {
        let err = ActionName::new("".to_string()).unwrap_err();
        let copy = err;
        assert_eq!(err.to_string(), copy.to_string());
    }

    #[test]
    fn parses_from_str() {
        let x: ActionName = "friend".parse().unwrap();
        assert_eq!(x.as_str(), "friend");

        let err = "/friend".parse::<ActionName>();
        assert!(matches!(err, Err(InvalidActionName::LeadingSlash)));
    }
}
