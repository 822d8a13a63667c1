//! Authenticated client for the marketplace chat backend.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::auth::Credentials;
use crate::models::{
    ConversationId, ConversationSummary, Message, NewRidePost, RidePost, Timestamp, UserId,
    UserProfile, ValidationError,
};
use crate::sync::{RemoteConversationStore, RemoteError, RemoteResult};
use crate::util::{compact_text, normalize_base_url};

const FALLBACK_ERROR: &str = "Something went wrong";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend error: {0}")]
    Api(String),
    #[error("Unexpected response: {0}")]
    UnexpectedShape(String),
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ApiError> for RemoteError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::Http(error) => Self::Transport(error.to_string()),
            ApiError::InvalidConfiguration(detail) => Self::Transport(detail.to_string()),
            ApiError::Api(message) => Self::Api(message),
            ApiError::UnexpectedShape(detail) => Self::UnexpectedShape(detail),
            ApiError::Validation(error) => Self::Api(error.to_string()),
        }
    }
}

/// Backend client bound to one signed-in user.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(
        base_url: impl AsRef<str>,
        credentials: Credentials,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.as_ref()).ok_or(
            ApiError::InvalidConfiguration("API base URL must include http:// or https://"),
        )?;
        if credentials.logic_token.trim().is_empty() {
            return Err(ApiError::InvalidConfiguration(
                "Session token must not be empty",
            ));
        }

        Ok(Self {
            base_url,
            client: Client::builder().timeout(timeout).build()?,
            credentials,
        })
    }

    pub const fn identity(&self) -> &UserId {
        &self.credentials.user_id
    }

    /// Messages of a conversation, optionally only those after `since`.
    pub async fn poll_conversation(
        &self,
        conversation_id: &ConversationId,
        since: Option<Timestamp>,
    ) -> ApiResult<Vec<Message>> {
        let mut query = vec![("conversationId", conversation_id.to_string())];
        if let Some(since) = since {
            query.push(("timeStamp", since.to_string()));
        }

        let request = self
            .client
            .get(self.endpoint("/PollConversation"))
            .query(&query);
        let payload = self.send(request).await?;
        let poll = decode::<PollResponse>(payload, "poll response")?;

        if let Some(returned) = poll.conversation_id.as_ref() {
            if returned != conversation_id {
                return Err(ApiError::UnexpectedShape(format!(
                    "poll for {conversation_id} answered for {returned}"
                )));
            }
        }
        Ok(poll.messages)
    }

    /// Append a message; the backend answers with the stored copy.
    pub async fn post_message(
        &self,
        conversation_id: &ConversationId,
        contents: &str,
    ) -> ApiResult<Message> {
        let payload = serde_json::json!({
            "conversationId": conversation_id,
            "contents": contents,
        });
        let request = self
            .client
            .post(self.endpoint("/PostMessage"))
            .json(&payload);
        let payload = self.send(request).await?;

        let payload = match payload {
            Value::Object(mut object) if object.contains_key("message") => {
                object.remove("message").unwrap_or(Value::Null)
            }
            other => other,
        };
        decode::<Message>(payload, "posted message")
    }

    pub async fn list_conversations(&self) -> ApiResult<Vec<ConversationSummary>> {
        let request = self.client.get(self.endpoint("/GetAllConversations"));
        let payload = self.send(request).await?;
        let listing = decode::<ConversationListing>(payload, "conversation listing")?;
        Ok(match listing {
            ConversationListing::Bare(conversations)
            | ConversationListing::Wrapped { conversations } => conversations,
        })
    }

    /// Open a conversation with `peer`, seeded with a first message.
    pub async fn create_conversation(
        &self,
        peer: &UserId,
        contents: &str,
    ) -> ApiResult<ConversationId> {
        let payload = serde_json::json!({
            "userId": peer,
            "contents": contents,
        });
        let request = self
            .client
            .post(self.endpoint("/CreateConversation"))
            .json(&payload);
        let payload = self.send(request).await?;
        let created = decode::<CreatedConversation>(payload, "created conversation")?;
        created
            .conversation_id
            .or(created.id)
            .ok_or_else(|| {
                ApiError::UnexpectedShape("response did not include a conversation id".to_string())
            })
    }

    /// Profile of the signed-in user.
    pub async fn get_user(&self) -> ApiResult<UserProfile> {
        let request = self.client.get(self.endpoint("/GetUser"));
        let payload = self.send(request).await?;
        decode::<UserProfile>(payload, "user profile")
    }

    /// Replace the signed-in user's profile with `profile`.
    pub async fn edit_user(&self, profile: &UserProfile) -> ApiResult<()> {
        profile.validate()?;
        let request = self.client.post(self.endpoint("/EditUser")).json(profile);
        self.send(request).await?;
        Ok(())
    }

    /// Publish a ride post, returning its id when the backend reports one.
    pub async fn save_post(&self, post: &NewRidePost) -> ApiResult<Option<String>> {
        post.validate()?;
        let request = self.client.post(self.endpoint("/SavePost")).json(post);
        let payload = self.send(request).await?;
        Ok(["postId", "id"]
            .iter()
            .find_map(|field| payload.get(*field).and_then(Value::as_str))
            .map(ToString::to_string))
    }

    /// Ride posts published by `poster`.
    pub async fn list_posts(&self, poster: &UserId) -> ApiResult<Vec<RidePost>> {
        let request = self
            .client
            .get(self.endpoint("/getPosts"))
            .query(&[("userId", poster.as_str())]);
        let payload = self.send(request).await?;
        let listing = decode::<PostListing>(payload, "post listing")?;
        Ok(match listing {
            PostListing::Bare(posts) | PostListing::Wrapped { posts } => posts,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.credentials.logic_token)
            .header("X-Db-Token", &self.credentials.db_token)
            .header("X-User-ID", self.credentials.user_id.as_str())
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Value> {
        let response = self.authenticated(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Api(parse_api_error(status, &body)));
        }

        let payload = serde_json::from_str::<Value>(&body).map_err(|error| {
            ApiError::UnexpectedShape(format!("invalid JSON ({error}): {}", compact_text(&body)))
        })?;
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            return Err(ApiError::Api(error.to_string()));
        }
        Ok(payload)
    }
}

impl RemoteConversationStore for ApiClient {
    async fn fetch_messages_since(
        &self,
        conversation_id: &ConversationId,
        since: Option<Timestamp>,
    ) -> RemoteResult<Vec<Message>> {
        Ok(self.poll_conversation(conversation_id, since).await?)
    }

    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        sender_id: &UserId,
        contents: &str,
    ) -> RemoteResult<Message> {
        if sender_id != self.identity() {
            return Err(RemoteError::Api(format!(
                "cannot send as {sender_id} while signed in as {}",
                self.identity()
            )));
        }
        Ok(self.post_message(conversation_id, contents).await?)
    }
}

/// Human-readable message for a failed response.
///
/// Prefers a JSON `error`/`message` field, then the raw body, then a generic fallback.
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("{FALLBACK_ERROR} ({})", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: Value, what: &str) -> ApiResult<T> {
    if payload.is_null() {
        return Err(ApiError::UnexpectedShape(format!("{what} was null")));
    }
    serde_json::from_value(payload)
        .map_err(|error| ApiError::UnexpectedShape(format!("malformed {what}: {error}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollResponse {
    #[serde(default)]
    conversation_id: Option<ConversationId>,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConversationListing {
    Bare(Vec<ConversationSummary>),
    Wrapped {
        conversations: Vec<ConversationSummary>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PostListing {
    Bare(Vec<RidePost>),
    Wrapped { posts: Vec<RidePost> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedConversation {
    conversation_id: Option<ConversationId>,
    id: Option<ConversationId>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorded {
        queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
        headers: Arc<Mutex<Vec<HeaderMap>>>,
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn credentials() -> Credentials {
        Credentials {
            logic_token: "logic-token".to_string(),
            db_token: "db-token".to_string(),
            user_id: UserId::new("me"),
            photo: None,
        }
    }

    fn client(url: &str) -> ApiClient {
        ApiClient::new(url, credentials(), Duration::from_secs(5)).unwrap()
    }

    fn conversation() -> ConversationId {
        ConversationId::new("ccccc-cccccccccc-ccccc")
    }

    async fn record_poll(
        State(recorded): State<Recorded>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        recorded.queries.lock().unwrap().push(query);
        recorded.headers.lock().unwrap().push(headers);
        Json(json!({
            "conversationId": "ccccc-cccccccccc-ccccc",
            "messages": [
                { "senderId": "u1", "contents": "hi", "timestamp": "2024-01-01T00:00:00Z" }
            ]
        }))
    }

    #[tokio::test]
    async fn poll_sends_auth_headers_and_since() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route("/PollConversation", get(record_poll))
            .with_state(recorded.clone());
        let api = client(&serve(router).await);

        let since = "2023-12-31T23:59:00Z".parse().unwrap();
        let messages = api.poll_conversation(&conversation(), Some(since)).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].contents, "hi");

        let queries = recorded.queries.lock().unwrap();
        assert_eq!(queries[0]["conversationId"], "ccccc-cccccccccc-ccccc");
        assert_eq!(queries[0]["timeStamp"], "2023-12-31T23:59:00Z");

        let headers = recorded.headers.lock().unwrap();
        assert_eq!(headers[0]["authorization"], "Bearer logic-token");
        assert_eq!(headers[0]["x-db-token"], "db-token");
        assert_eq!(headers[0]["x-user-id"], "me");
    }

    #[tokio::test]
    async fn first_poll_omits_timestamp() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route("/PollConversation", get(record_poll))
            .with_state(recorded.clone());
        let api = client(&serve(router).await);

        api.poll_conversation(&conversation(), None).await.unwrap();

        assert!(!recorded.queries.lock().unwrap()[0].contains_key("timeStamp"));
    }

    #[tokio::test]
    async fn non_success_status_becomes_api_error() {
        let router = Router::new().route(
            "/PollConversation",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database offline") }),
        );
        let api = client(&serve(router).await);

        let error = api.poll_conversation(&conversation(), None).await.unwrap_err();

        assert!(matches!(&error, ApiError::Api(message) if message == "database offline (500)"));
        assert_eq!(
            RemoteError::from(error),
            RemoteError::Api("database offline (500)".to_string())
        );
    }

    #[tokio::test]
    async fn null_and_malformed_payloads_are_unexpected_shape() {
        let router = Router::new()
            .route("/PollConversation", get(|| async { Json(Value::Null) }))
            .route(
                "/GetAllConversations",
                get(|| async { Json(json!({ "unexpected": true })) }),
            );
        let api = client(&serve(router).await);

        assert!(matches!(
            api.poll_conversation(&conversation(), None).await,
            Err(ApiError::UnexpectedShape(_))
        ));
        assert!(matches!(
            api.list_conversations().await,
            Err(ApiError::UnexpectedShape(_))
        ));
    }

    #[tokio::test]
    async fn error_field_in_success_body_is_api_error() {
        let router = Router::new().route(
            "/PostMessage",
            post(|| async { Json(json!({ "error": "Conversation not found" })) }),
        );
        let api = client(&serve(router).await);

        let error = api.post_message(&conversation(), "hello").await.unwrap_err();
        assert_eq!(error.to_string(), "Backend error: Conversation not found");
    }

    #[tokio::test]
    async fn post_message_returns_stored_copy() {
        let router = Router::new().route(
            "/PostMessage",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "senderId": "me",
                    "contents": body["contents"],
                    "timestamp": "2024-01-01T00:05:00Z"
                }))
            }),
        );
        let api = client(&serve(router).await);

        let stored = api
            .append_message(&conversation(), &UserId::new("me"), "hello")
            .await
            .unwrap();

        assert_eq!(
            stored,
            Message::new(
                UserId::new("me"),
                "hello",
                "2024-01-01T00:05:00Z".parse().unwrap()
            )
        );
    }

    #[tokio::test]
    async fn listing_accepts_bare_and_wrapped_shapes() {
        let entry = json!({
            "conversationId": "c1",
            "user": { "userId": "bbbbb", "name": "Bob" },
            "messages": []
        });
        let bare = entry.clone();
        let router = Router::new()
            .route(
                "/GetAllConversations",
                get(move || {
                    let bare = bare.clone();
                    async move { Json(json!([bare])) }
                }),
            );
        let api = client(&serve(router).await);
        assert_eq!(api.list_conversations().await.unwrap().len(), 1);

        let router = Router::new().route(
            "/GetAllConversations",
            get(move || {
                let entry = entry.clone();
                async move { Json(json!({ "conversations": [entry] })) }
            }),
        );
        let api = client(&serve(router).await);
        let listing = api.list_conversations().await.unwrap();
        assert_eq!(listing[0].user.name, "Bob");
    }

    #[tokio::test]
    async fn create_conversation_accepts_legacy_id() {
        let router = Router::new().route(
            "/CreateConversation",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["userId"], "bbbbb");
                Json(json!({ "id": "new-conversation" }))
            }),
        );
        let api = client(&serve(router).await);

        let id = api
            .create_conversation(&UserId::new("bbbbb"), "Is the seat still free?")
            .await
            .unwrap();
        assert_eq!(id, ConversationId::new("new-conversation"));
    }

    fn post_entry() -> Value {
        json!({
            "postId": "aaaaa-aaaaaaaaaa-aaaaa",
            "posterId": "me",
            "name": "Campus to airport",
            "description": "Leaving after class",
            "originName": "Campus", "originLat": 37.87, "originLng": -122.26,
            "destinationName": "SFO", "destinationLat": 37.62, "destinationLng": -122.38,
            "departureDate": "2024-11-01T15:00:00Z",
            "price": 20, "seatsAvailable": 3
        })
    }

    fn new_post() -> NewRidePost {
        NewRidePost {
            name: "Campus to airport".to_string(),
            description: "Leaving after class".to_string(),
            origin_name: "Campus".to_string(),
            origin_lat: 37.87,
            origin_lng: -122.26,
            destination_name: "SFO".to_string(),
            destination_lat: 37.62,
            destination_lng: -122.38,
            departure_date: "2024-11-01T15:00:00Z".parse().unwrap(),
            price: 20.0,
            seats_available: 3,
        }
    }

    #[tokio::test]
    async fn get_user_reads_profile_with_auth_headers() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route(
                "/GetUser",
                get(|State(recorded): State<Recorded>, headers: HeaderMap| async move {
                    recorded.headers.lock().unwrap().push(headers);
                    Json(json!({
                        "name": "Alice",
                        "email": "alice@example.com",
                        "bio": "Daily commuter",
                        "phone": "5551234567",
                        "photo": null
                    }))
                }),
            )
            .with_state(recorded.clone());
        let api = client(&serve(router).await);

        let profile = api.get_user().await.unwrap();

        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.phone.as_deref(), Some("5551234567"));
        assert_eq!(recorded.headers.lock().unwrap()[0]["x-user-id"], "me");
    }

    #[tokio::test]
    async fn edit_user_posts_whole_profile() {
        let bodies: Arc<Mutex<Vec<Value>>> = Arc::default();
        let seen = Arc::clone(&bodies);
        let router = Router::new().route(
            "/EditUser",
            post(move |Json(body): Json<Value>| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(body);
                    Json(json!({ "message": "updated" }))
                }
            }),
        );
        let api = client(&serve(router).await);
        let profile = UserProfile {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            bio: Some("Weekend trips".to_string()),
            phone: None,
            photo: None,
        };

        api.edit_user(&profile).await.unwrap();

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies[0]["bio"], "Weekend trips");
        assert_eq!(bodies[0]["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn invalid_profile_never_reaches_backend() {
        let api = client(&serve(Router::new()).await);
        let profile = UserProfile {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: Some("12345".to_string()),
            ..UserProfile::default()
        };

        assert!(matches!(
            api.edit_user(&profile).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn save_post_sends_wire_body_and_returns_id() {
        let router = Router::new().route(
            "/SavePost",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["originName"], "Campus");
                assert_eq!(body["seatsAvailable"], 3);
                Json(json!({ "postId": "aaaaa-aaaaaaaaaa-aaaaa" }))
            }),
        );
        let api = client(&serve(router).await);

        let id = api.save_post(&new_post()).await.unwrap();
        assert_eq!(id.as_deref(), Some("aaaaa-aaaaaaaaaa-aaaaa"));
    }

    #[tokio::test]
    async fn save_post_surfaces_backend_error() {
        let router = Router::new().route(
            "/SavePost",
            post(|| async { Json(json!({ "error": "Departure date is in the past" })) }),
        );
        let api = client(&serve(router).await);

        let error = api.save_post(&new_post()).await.unwrap_err();
        assert!(matches!(error, ApiError::Api(message) if message == "Departure date is in the past"));
    }

    #[tokio::test]
    async fn list_posts_filters_by_poster() {
        let recorded = Recorded::default();
        let router = Router::new()
            .route(
                "/getPosts",
                get(
                    |State(recorded): State<Recorded>,
                     Query(query): Query<HashMap<String, String>>| async move {
                        recorded.queries.lock().unwrap().push(query);
                        Json(json!([post_entry()]))
                    },
                ),
            )
            .with_state(recorded.clone());
        let api = client(&serve(router).await);

        let posts = api.list_posts(&UserId::new("me")).await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].destination_name, "SFO");
        assert_eq!(recorded.queries.lock().unwrap()[0]["userId"], "me");
    }

    #[tokio::test]
    async fn list_posts_accepts_wrapped_listing() {
        let router = Router::new().route(
            "/getPosts",
            get(|| async { Json(json!({ "posts": [post_entry()] })) }),
        );
        let api = client(&serve(router).await);

        let posts = api.list_posts(&UserId::new("me")).await.unwrap();
        assert_eq!(posts[0].post_id.as_deref(), Some("aaaaa-aaaaaaaaaa-aaaaa"));
    }

    #[test]
    fn parse_api_error_prefers_json_fields() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"error":"Bad conversation"}"#),
            "Bad conversation (400)"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "  "),
            "Something went wrong (502)"
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(matches!(
            ApiClient::new("localhost:8080", credentials(), Duration::from_secs(1)),
            Err(ApiError::InvalidConfiguration(_))
        ));
    }
}
