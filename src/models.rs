use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    pub user: PublicUser,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub description: String,
    pub date: String,
    #[serde(rename = "isAIIdentified")]
    pub is_ai_identified: bool,
    pub category: Category,
}

#[derive(Deserialize)]
pub struct CreateTransactionPayload {
    pub amount: f64,
    pub description: String,
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct GetTransactionsResponse {
    pub success: bool,
    pub count: usize,
    pub transactions: Vec<Transaction>,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub transaction: Transaction,
}

#[derive(Serialize)]
pub struct ClearTransactionsResponse {
    pub success: bool,
    pub message: String,
    pub count: u64,
}

#[derive(Serialize)]
pub struct GetCategoriesResponse {
    pub success: bool,
    pub categories: Vec<Category>,
}

/// One transaction extracted from a receipt image, pre-confirmation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExtractedTransaction {
    pub amount: f64,
    pub description: String,
    pub date: Option<String>,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize)]
pub struct ScanReceiptResponse {
    pub success: bool,
    pub extracted: Vec<ExtractedTransaction>,
}

/// Save payload accepts either a single transaction or a batch.
#[derive(Deserialize)]
pub struct SaveScannedPayload {
    pub transactions: Option<Vec<ScannedItem>>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ScannedItem {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct SaveScannedResponse {
    pub success: bool,
    pub transactions: Vec<Transaction>,
    pub transaction: Transaction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatPayload {
    pub message: String,
    pub history: Option<Vec<ChatMessage>>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub reply: String,
}
