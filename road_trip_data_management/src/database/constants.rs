pub const USER_DOCUMENTS_TABLE_NAME: &str = "UserDocuments";
pub const USER_ID: &str = "user_id";
pub const DOCUMENT: &str = "document";
pub const UPDATED_AT: &str = "updated_at";
