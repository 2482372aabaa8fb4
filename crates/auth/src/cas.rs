//! CAS `serviceValidate` response parsing.
//!
//! The campus SSO answers ticket validation with a small XML document. Only
//! two facts are read from it: whether `<cas:authenticationSuccess>` is
//! present, and the `<cas:user>` it names.

/// Successful CAS ticket validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasSuccess {
    /// Campus net id of the authenticated user.
    pub username: String,
}

/// Parse a CAS 2.0 `serviceValidate` response body.
///
/// Returns `None` for authentication failures and for malformed bodies; the
/// caller treats both as a rejected ticket.
pub fn parse_service_validate(body: &str) -> Option<CasSuccess> {
    if !body.contains("<cas:authenticationSuccess>") {
        return None;
    }

    let start = body.find("<cas:user>")? + "<cas:user>".len();
    let end = body[start..].find("</cas:user>")? + start;
    let username = body[start..end].trim();

    if username.is_empty() {
        return None;
    }

    Some(CasSuccess {
        username: username.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_validation() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
    <cas:authenticationSuccess>
        <cas:user>netid123</cas:user>
    </cas:authenticationSuccess>
</cas:serviceResponse>"#;

        assert_eq!(
            parse_service_validate(body),
            Some(CasSuccess {
                username: "netid123".to_string()
            })
        );
    }

    #[test]
    fn rejects_authentication_failure() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
    <cas:authenticationFailure code="INVALID_TICKET">
        Ticket ST-xyz not recognized
    </cas:authenticationFailure>
</cas:serviceResponse>"#;

        assert_eq!(parse_service_validate(body), None);
    }

    #[test]
    fn rejects_success_without_a_user() {
        let body = "<cas:authenticationSuccess></cas:authenticationSuccess>";
        assert_eq!(parse_service_validate(body), None);

        let body = "<cas:authenticationSuccess><cas:user>  </cas:user></cas:authenticationSuccess>";
        assert_eq!(parse_service_validate(body), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_service_validate(""), None);
        assert_eq!(parse_service_validate("not xml at all"), None);
    }
}
