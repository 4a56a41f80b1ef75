use std::str::FromStr;

use uuid::Uuid;

use crate::db::error::{DbError, DbResult};

/// Parse a UUID string from the database, returning a DbError on failure
pub fn parse_uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Parse an enum stored as its SCREAMING_CASE text form.
pub fn parse_column<T>(s: &str) -> DbResult<T>
where
    T: FromStr<Err = String>,
{
    s.parse().map_err(DbError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccessType;

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_parse_column_surfaces_corrupt_values() {
        assert_eq!(parse_column::<AccessType>("GROUP").unwrap(), AccessType::Group);
        let err = parse_column::<AccessType>("SECRET").unwrap_err();
        assert!(matches!(err, DbError::Internal(msg) if msg.contains("SECRET")));
    }
}
