use http::Method;
use uuid::Uuid;

/// The request facts an access decision depends on.
///
/// Target ids are kept as the raw strings taken from the path or body. An id
/// that is not a valid UUID can never match a stored row, so it resolves the
/// same way a dangling id does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub method: Method,
    pub target_document_id: Option<String>,
    pub target_group_id: Option<String>,
}

impl AccessRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            target_document_id: None,
            target_group_id: None,
        }
    }

    pub fn with_document(mut self, id: impl Into<String>) -> Self {
        self.target_document_id = Some(id.into());
        self
    }

    pub fn with_group(mut self, id: impl Into<String>) -> Self {
        self.target_group_id = Some(id.into());
        self
    }

    /// GET and HEAD. Every other verb counts as a mutation.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    pub fn has_document_target(&self) -> bool {
        self.target_document_id.is_some()
    }

    pub(crate) fn document_uuid(&self) -> Option<Result<Uuid, ()>> {
        self.target_document_id.as_deref().map(parse_target)
    }

    pub(crate) fn group_uuid(&self) -> Option<Result<Uuid, ()>> {
        self.target_group_id.as_deref().map(parse_target)
    }
}

fn parse_target(raw: &str) -> Result<Uuid, ()> {
    Uuid::parse_str(raw.trim()).map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Method::GET, true)]
    #[case(Method::HEAD, true)]
    #[case(Method::POST, false)]
    #[case(Method::PUT, false)]
    #[case(Method::PATCH, false)]
    #[case(Method::DELETE, false)]
    #[case(Method::OPTIONS, false)]
    fn test_is_read(#[case] method: Method, #[case] expected: bool) {
        assert_eq!(AccessRequest::new(method).is_read(), expected);
    }

    #[test]
    fn test_target_parsing() {
        let id = Uuid::new_v4();
        let req = AccessRequest::new(Method::GET)
            .with_document(format!(" {} ", id))
            .with_group("not-a-uuid");
        assert_eq!(req.document_uuid(), Some(Ok(id)));
        assert_eq!(req.group_uuid(), Some(Err(())));
        assert_eq!(AccessRequest::new(Method::GET).document_uuid(), None);
    }
}
