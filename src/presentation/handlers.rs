use crate::application::user_service::UserService;
use crate::data::user_repository::DatabaseUserRepository;
use crate::domain::user::{LoginForm, RegisterForm, User};
use actix_web::body::BoxBody;
use actix_web::{HttpRequest, HttpResponse, Responder, ResponseError, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const LOGIN_FORM_PAGE: &str = "login-form.jsp";
pub const SUCCESS_PAGE: &str = "success.jsp";
pub const FAILED_PAGE: &str = "failed.jsp";
pub const USER_LIST_PAGE: &str = "user-list.jsp";

pub const VIEW_NAME_HEADER: &str = "x-view-name";

// AppState holding the service
pub struct AppState {
    pub user_service: UserService<DatabaseUserRepository>,
}

// Uniform error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ResponseError for PlatformError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            PlatformError::BadRequest(_) => actix_web::http::StatusCode::BAD_REQUEST,
            PlatformError::NotFound(_) => actix_web::http::StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        let details = match self {
            PlatformError::BadRequest(msg) | PlatformError::NotFound(msg) => {
                json!({ "message": msg })
            }
        };

        warn!(error = %error_msg, status = %status, "Request rejected");

        HttpResponse::build(status).json(ErrorResponse {
            error: error_msg,
            details,
        })
    }
}

/// Body rendered for every page: the view name plus whatever the template needs.
#[derive(Debug, Serialize, Deserialize)]
pub struct ViewBody {
    pub view: String,
    pub model: serde_json::Value,
}

/// A named page handed to the templating layer.
#[derive(Debug)]
pub struct View {
    name: &'static str,
    model: serde_json::Value,
}

impl View {
    pub fn page(name: &'static str) -> Self {
        Self {
            name,
            model: serde_json::Value::Null,
        }
    }

    pub fn with_model(name: &'static str, model: serde_json::Value) -> Self {
        Self { name, model }
    }

    /// `success.jsp` or `failed.jsp`.
    pub fn outcome(succeeded: bool) -> Self {
        Self::page(if succeeded { SUCCESS_PAGE } else { FAILED_PAGE })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Responder for View {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        HttpResponse::Ok()
            .insert_header((VIEW_NAME_HEADER, self.name))
            .json(ViewBody {
                view: self.name.to_string(),
                model: self.model,
            })
    }
}

/// Malformed form bodies become a JSON 400 instead of actix's plain-text one.
pub fn form_config() -> web::FormConfig {
    web::FormConfig::default()
        .error_handler(|err, _req| PlatformError::BadRequest(err.to_string()).into())
}

/// Route table of the user platform.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(form_config())
        .route("/health", web::get().to(health_check))
        .service(
            web::resource("/login")
                .route(web::get().to(login_page))
                .route(web::post().to(login)),
        )
        .route("/register", web::post().to(register))
        .service(
            web::scope("/user")
                .route("/list", web::get().to(list_users))
                .route("/init", web::get().to(init_table)),
        );
}

// Handlers

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[instrument]
pub async fn health_check() -> HttpResponse {
    info!("Health check requested");
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    HttpResponse::Ok().json(response)
}

#[instrument(skip(req), fields(path = %req.path()))]
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, PlatformError> {
    Err(PlatformError::NotFound(format!(
        "No page for {} {}",
        req.method(),
        req.path()
    )))
}

#[instrument]
pub async fn login_page() -> View {
    info!("Entering login/register page");
    View::page(LOGIN_FORM_PAGE)
}

#[instrument(skip(state, form), fields(name = ?form.name))]
pub async fn login(state: web::Data<AppState>, form: web::Form<LoginForm>) -> View {
    let LoginForm { name, password } = form.into_inner();
    let (Some(name), Some(password)) = (name, password) else {
        warn!("Login attempted without name or password");
        return View::outcome(false);
    };

    match state
        .user_service
        .query_user_by_name_and_password(&name, &password)
        .await
    {
        Some(user) => {
            info!(user_id = user.id, "Login succeeded");
            View::outcome(true)
        }
        None => {
            warn!("Login rejected");
            View::outcome(false)
        }
    }
}

#[instrument(skip(state, form), fields(name = ?form.name, email = ?form.email))]
pub async fn register(state: web::Data<AppState>, form: web::Form<RegisterForm>) -> View {
    info!("Registration request received");
    let user = User::from(form.into_inner());
    let registered = state.user_service.register(&user).await;
    if !registered {
        warn!("Registration failed");
    }
    View::outcome(registered)
}

/// Row of the user list page. Passwords never reach a rendered page.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserListItem {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
}

impl From<User> for UserListItem {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
        }
    }
}

#[instrument(skip(state))]
pub async fn list_users(state: web::Data<AppState>) -> View {
    let users: Vec<UserListItem> = state
        .user_service
        .query_all_users()
        .await
        .into_iter()
        .map(UserListItem::from)
        .collect();
    info!(count = users.len(), "Listing users");
    View::with_model(USER_LIST_PAGE, json!({ "users": users }))
}

#[instrument(skip(state))]
pub async fn init_table(state: web::Data<AppState>) -> View {
    info!("Initializing users table");
    View::outcome(state.user_service.init_table().await)
}
