/// Database row types. These map directly to SQLite rows and stay
/// independent of the vista-types wire models.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct ItemRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
}

pub struct ConversationLogRow {
    pub id: i64,
    pub user_id: i64,
    pub text_query: Option<String>,
    pub image_url: Option<String>,
    pub response_text: Option<String>,
    pub llm_model_name: Option<String>,
    pub vlm_model_name: Option<String>,
    pub timestamp: String,
}

/// Everything needed to append one interaction to the log.
pub struct NewConversationLog {
    pub user_id: i64,
    pub text_query: Option<String>,
    pub image_url: Option<String>,
    pub response_text: String,
    pub llm_model_name: Option<String>,
    pub vlm_model_name: Option<String>,
}
