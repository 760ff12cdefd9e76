pub mod request_context;

use crate::application::use_cases::local_edit::TestCaseUpdate;
use crate::application::use_cases::story_resolution::{extract_story_id, Resolution};
use crate::domain::error::AppError;
use crate::domain::language::UiLanguage;
use crate::domain::test_case::{GenerationMode, HistoryEntry, TestCase};
use crate::domain::work_item::deserialize_optional_id;
use crate::infrastructure::export::EXPORT_FILE_NAME;
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{
    dev::Server, get, post, web, App, HttpMessage, HttpRequest, HttpResponse, HttpServer,
    Responder,
};
use chrono::Local;
use request_context::{RequestContext, LANG_COOKIE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};

pub const STORY_ID_REQUIRED: &str = "Story ID is required.";
const UNSUPPORTED_MEDIA_TYPE: &str = "Unsupported Media Type";
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Deserialize)]
struct StoryForm {
    #[serde(default)]
    story_id: String,
}

#[derive(Deserialize)]
struct StoryRequest {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    story_id: Option<u64>,
}

impl StoryRequest {
    fn story_id(&self) -> Option<u64> {
        self.story_id.filter(|id| *id != 0)
    }
}

#[derive(Serialize)]
struct IndexView {
    status: &'static str,
    lang: UiLanguage,
    story_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    test_cases: Vec<TestCase>,
    history: Vec<HistoryEntry>,
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "status": "error", "message": message }))
}

fn internal_error(data: &HttpState, context: &str, err: &AppError) -> HttpResponse {
    add_log(&data.logs, "ERROR", "HttpApi", &format!("{}: {}", context, err));
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.message())
}

fn success() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "success" }))
}

fn redirect_home() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .finish()
}

/// Runs store-bound work on the blocking pool.
async fn blocking<T, F>(data: &HttpState, work: F) -> Result<T, AppError>
where
    F: FnOnce(&AppState) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let app = data.app.clone();
    web::block(move || work(&app))
        .await
        .map_err(|e| AppError::Internal(format!("Blocking task failed: {}", e)))?
}

async fn render_index(
    data: &HttpState,
    ctx: RequestContext,
    story_id: String,
    resolution: Option<Resolution>,
    error: Option<String>,
) -> HttpResponse {
    let history = blocking(data, |app| app.local_edit_use_case.history())
        .await
        .unwrap_or_else(|e| {
            add_log(&data.logs, "ERROR", "Store", &format!("Failed to load history: {}", e));
            Vec::new()
        });
    let test_cases = blocking(data, |app| app.local_edit_use_case.list())
        .await
        .unwrap_or_else(|e| {
            add_log(&data.logs, "ERROR", "Store", &format!("Failed to load test cases: {}", e));
            Vec::new()
        });

    HttpResponse::Ok().json(IndexView {
        status: if error.is_some() { "error" } else { "success" },
        lang: ctx.lang,
        story_id,
        resolution,
        error,
        test_cases,
        history,
    })
}

#[get("/")]
async fn index(data: web::Data<HttpState>, ctx: RequestContext) -> impl Responder {
    render_index(&data, ctx, String::new(), None, None).await
}

#[post("/")]
async fn resolve(
    data: web::Data<HttpState>,
    ctx: RequestContext,
    form: web::Form<StoryForm>,
) -> impl Responder {
    let input = form.story_id.trim();
    let story_id = extract_story_id(input)
        .map(|id| id.to_string())
        .unwrap_or_default();
    add_log(
        &data.logs,
        "INFO",
        "Resolve",
        &format!("Resolving work item '{}'", input),
    );

    match data.app.resolution_use_case.execute(input).await {
        Ok(resolution) => render_index(&data, ctx, story_id, Some(resolution), None).await,
        Err(message) => {
            let localized = message.localized(ctx.lang);
            add_log(&data.logs, "WARN", "Resolve", &localized);
            render_index(&data, ctx, story_id, None, Some(localized)).await
        }
    }
}

async fn run_generation(data: &HttpState, form: &StoryForm, mode: GenerationMode) -> HttpResponse {
    let Some(story_id) = extract_story_id(&form.story_id) else {
        return error_response(StatusCode::BAD_REQUEST, STORY_ID_REQUIRED);
    };
    add_log(
        &data.logs,
        "INFO",
        "Generate",
        &format!("{:?} test cases for story {}", mode, story_id),
    );

    match data.app.generation_use_case.execute(story_id, mode).await {
        Ok(report) => {
            let level = if report.fallback_used { "WARN" } else { "INFO" };
            add_log(
                &data.logs,
                level,
                "Generate",
                &format!(
                    "Story {}: {} test case(s), fallback={}",
                    story_id,
                    report.test_cases.len(),
                    report.fallback_used
                ),
            );
            HttpResponse::Ok().json(json!({
                "status": "success",
                "test_cases": report.test_cases,
                "fallback_used": report.fallback_used,
                "fallback_reason": report.fallback_reason,
            }))
        }
        Err(AppError::TrackerError(message)) => {
            add_log(&data.logs, "WARN", "Generate", &message);
            error_response(StatusCode::OK, &message)
        }
        Err(e) => internal_error(data, "Generation failed", &e),
    }
}

#[post("/generate")]
async fn generate(data: web::Data<HttpState>, form: web::Form<StoryForm>) -> impl Responder {
    run_generation(&data, &form, GenerationMode::Generate).await
}

#[post("/regenerate")]
async fn regenerate(data: web::Data<HttpState>, form: web::Form<StoryForm>) -> impl Responder {
    run_generation(&data, &form, GenerationMode::Regenerate).await
}

#[post("/update_test_case")]
async fn update_test_case(
    data: web::Data<HttpState>,
    req: web::Json<TestCaseUpdate>,
) -> impl Responder {
    let update = req.into_inner();
    let id = update.id;
    match blocking(&data, move |app| app.local_edit_use_case.update(update)).await {
        Ok(updated) => {
            add_log(
                &data.logs,
                "INFO",
                "LocalEdit",
                &format!("Updated test case {} (found={})", id, updated),
            );
            HttpResponse::Ok().json(json!({ "status": "success", "updated": updated }))
        }
        Err(AppError::ValidationError(message)) => {
            error_response(StatusCode::BAD_REQUEST, &message)
        }
        Err(e) => internal_error(&data, "Update failed", &e),
    }
}

#[post("/delete_test_case/{id}")]
async fn delete_test_case(data: web::Data<HttpState>, path: web::Path<u64>) -> impl Responder {
    let id = path.into_inner();
    match blocking(&data, move |app| app.local_edit_use_case.delete(id)).await {
        Ok(deleted) => {
            HttpResponse::Ok().json(json!({ "status": "success", "deleted": deleted }))
        }
        Err(e) => internal_error(&data, "Delete failed", &e),
    }
}

#[post("/delete_all_test_cases")]
async fn delete_all_test_cases(data: web::Data<HttpState>) -> impl Responder {
    match blocking(&data, |app| app.local_edit_use_case.delete_all()).await {
        Ok(()) => {
            add_log(&data.logs, "INFO", "LocalEdit", "Cleared local test cases");
            success()
        }
        Err(e) => internal_error(&data, "Delete failed", &e),
    }
}

#[post("/push_to_azure")]
async fn push_to_azure(data: web::Data<HttpState>, req: web::Json<StoryRequest>) -> impl Responder {
    let Some(story_id) = req.story_id() else {
        return error_response(StatusCode::BAD_REQUEST, STORY_ID_REQUIRED);
    };

    match data.app.sync_use_case.push(story_id).await {
        Ok(report) => match report.message() {
            None => {
                add_log(
                    &data.logs,
                    "INFO",
                    "Sync",
                    &format!("Pushed {} test case(s) for story {}", report.updated.len(), story_id),
                );
                HttpResponse::Ok().json(json!({ "status": "success", "report": report }))
            }
            Some(message) => HttpResponse::Ok().json(json!({
                "status": "error",
                "message": message,
                "report": report,
            })),
        },
        Err(e) => internal_error(&data, "Push failed", &e),
    }
}

#[post("/fetch_azure_test_cases")]
async fn fetch_azure_test_cases(
    data: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Bytes,
) -> impl Responder {
    if req.content_type() != "application/json" {
        return error_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, UNSUPPORTED_MEDIA_TYPE);
    }
    let story_id = serde_json::from_slice::<StoryRequest>(&body)
        .ok()
        .and_then(|request| request.story_id());
    let Some(story_id) = story_id else {
        return error_response(StatusCode::BAD_REQUEST, STORY_ID_REQUIRED);
    };

    match data.app.sync_use_case.pull(story_id).await {
        Ok(test_cases) => {
            add_log(
                &data.logs,
                "INFO",
                "Sync",
                &format!("Pulled {} test case(s) for story {}", test_cases.len(), story_id),
            );
            HttpResponse::Ok().json(json!({ "status": "success", "test_cases": test_cases }))
        }
        Err(e) => internal_error(&data, "Pull failed", &e),
    }
}

#[get("/export_excel")]
async fn export_excel(data: web::Data<HttpState>) -> impl Responder {
    match blocking(&data, |app| app.export_use_case.execute()).await {
        Ok(Some(bytes)) => HttpResponse::Ok()
            .content_type(XLSX_CONTENT_TYPE)
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ))
            .body(bytes),
        Ok(None) => redirect_home(),
        Err(e) => internal_error(&data, "Export failed", &e),
    }
}

#[get("/switch_language")]
async fn switch_language(ctx: RequestContext) -> impl Responder {
    let cookie = Cookie::build(LANG_COOKIE, ctx.lang.toggled().code())
        .path("/")
        .finish();
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(cookie)
        .finish()
}

#[get("/projects")]
async fn api_projects(data: web::Data<HttpState>) -> impl Responder {
    let projects = data.app.hierarchy_use_case.projects().await;
    add_log(
        &data.logs,
        "INFO",
        "Hierarchy",
        &format!("Listed {} project(s)", projects.len()),
    );
    HttpResponse::Ok().json(projects)
}

#[get("/epics/{project_id}")]
async fn api_epics(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    HttpResponse::Ok().json(data.app.hierarchy_use_case.epics(&path).await)
}

#[get("/features/{project_id}/{epic_id}")]
async fn api_features(
    data: web::Data<HttpState>,
    path: web::Path<(String, u64)>,
) -> impl Responder {
    let (project_id, epic_id) = path.into_inner();
    HttpResponse::Ok().json(
        data.app
            .hierarchy_use_case
            .features(&project_id, epic_id)
            .await,
    )
}

#[get("/user_stories/{project_id}/{feature_id}")]
async fn api_user_stories(
    data: web::Data<HttpState>,
    path: web::Path<(String, u64)>,
) -> impl Responder {
    let (project_id, feature_id) = path.into_inner();
    HttpResponse::Ok().json(
        data.app
            .hierarchy_use_case
            .backlog_items(&project_id, feature_id)
            .await,
    )
}

#[get("/user_story_details/{story_id}")]
async fn api_user_story_details(
    data: web::Data<HttpState>,
    path: web::Path<u64>,
) -> impl Responder {
    HttpResponse::Ok().json(
        data.app
            .hierarchy_use_case
            .story_details(path.into_inner())
            .await,
    )
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data.logs.lock().unwrap_or_else(PoisonError::into_inner);
    HttpResponse::Ok().json(&*logs)
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().unwrap_or_else(PoisonError::into_inner);
    logs.push(entry);
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(resolve)
        .service(generate)
        .service(regenerate)
        .service(update_test_case)
        .service(delete_test_case)
        .service(delete_all_test_cases)
        .service(push_to_azure)
        .service(fetch_azure_test_cases)
        .service(export_excel)
        .service(switch_language)
        .service(
            web::scope("/api")
                .service(api_projects)
                .service(api_epics)
                .service(api_features)
                .service(api_user_stories)
                .service(api_user_story_details)
                .service(get_logs),
        );
}

pub fn start_server(
    app: Arc<AppState>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
    host: &str,
    port: u16,
) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { app, logs });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Allow all origins for local tool

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::generation::STORY_UNAVAILABLE;
    use crate::application::use_cases::sync::{NO_CHANGES, PULL_FAILED};
    use crate::application::use_cases::test_support::{story, FakeLlm, FakeTracker};
    use crate::domain::test_case::{Steps, TestStep};
    use crate::infrastructure::config::AppConfig;
    use crate::infrastructure::storage::{InMemoryStore, TestCaseStore};
    use actix_web::http::header::ContentType;
    use actix_web::test as actix_test;
    use serde_json::Value;

    const ONE_CASE: &str = r#"[{"title": "Valid login", "steps": [{"step": "Enter creds", "expected": "Accepted"}], "expected_result": "Home shown"}]"#;

    fn tracker() -> FakeTracker {
        FakeTracker::default()
            .with_item(story(2, "Accounts"), "Feature")
            .with_item(story(10, "Login"), "Product Backlog Item")
            .with_child(2, 10)
    }

    fn http_state(tracker: FakeTracker) -> (web::Data<HttpState>, Arc<InMemoryStore>) {
        let mut config = AppConfig::default();
        config.tracker.project = "Demo".to_string();
        config.generation.pacing_ms = 0;
        let store = Arc::new(InMemoryStore::new());
        let app = AppState::new(
            &config,
            Arc::new(tracker),
            Arc::new(FakeLlm::replying(ONE_CASE)),
            store.clone(),
        );
        let state = web::Data::new(HttpState {
            app: Arc::new(app),
            logs: Arc::new(Mutex::new(Vec::new())),
        });
        (state, store)
    }

    fn stored_case(id: u64, title: &str) -> TestCase {
        TestCase {
            id,
            title: title.to_string(),
            steps: Steps::Structured(vec![TestStep::new("Open", "Opened")]),
            expected_result: "Done".to_string(),
            story_id: Some(10),
            generated: None,
            regenerated: None,
        }
    }

    #[actix_web::test]
    async fn test_index_defaults_to_arabic_view() {
        let (state, _) = http_state(tracker());
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "success");
        assert_eq!(body["lang"], "ar");
        assert_eq!(body["history"], json!([]));
        assert!(body.get("resolution").is_none());
    }

    #[actix_web::test]
    async fn test_resolve_reports_localized_errors() {
        let (state, _) = http_state(tracker());
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/")
            .cookie(Cookie::new(LANG_COOKIE, "en"))
            .set_form([("story_id", "not a link")])
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Please enter a valid id or link.");

        let req = actix_test::TestRequest::post()
            .uri("/")
            .set_form([("story_id", "555")])
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["error"], "لم يتم التعرف على نوع العنصر برقم 555.");
    }

    #[actix_web::test]
    async fn test_resolve_backlog_item_from_link() {
        let (state, _) = http_state(tracker());
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/")
            .set_form([("story_id", "https://dev.azure.com/acme/Shop/_workitems/edit/10")])
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["story_id"], "10");
        assert_eq!(body["resolution"]["kind"], "backlog_item");
        assert_eq!(body["resolution"]["story"]["title"], "Login");
        assert_eq!(body["resolution"]["feature"]["title"], "Accounts");
    }

    #[actix_web::test]
    async fn test_generate_then_export() {
        let (state, store) = http_state(tracker());
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/generate")
            .set_form([("story_id", "10")])
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["fallback_used"], false);
        assert_eq!(body["test_cases"].as_array().map(Vec::len), Some(1));
        assert_eq!(store.load().unwrap().len(), 1);

        let req = actix_test::TestRequest::get().uri("/export_excel").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.contains("attachment"));
        assert!(disposition.contains("test_cases.xlsx"));

        let req = actix_test::TestRequest::get().uri("/api/logs").to_request();
        let logs: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert!(!logs.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_generate_unreadable_story_and_missing_id() {
        let (state, _) = http_state(tracker());
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/generate")
            .set_form([("story_id", "999")])
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], STORY_UNAVAILABLE);

        let req = actix_test::TestRequest::post()
            .uri("/regenerate")
            .set_form([("story_id", "")])
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_export_empty_store_redirects_home() {
        let (state, _) = http_state(tracker());
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/export_excel").to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
    }

    #[actix_web::test]
    async fn test_switch_language_flips_cookie() {
        let (state, _) = http_state(tracker());
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/switch_language").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let cookie = resp
            .response()
            .cookies()
            .find(|cookie| cookie.name() == LANG_COOKIE)
            .map(|cookie| cookie.value().to_string());
        assert_eq!(cookie, Some("en".to_string()));

        let req = actix_test::TestRequest::get()
            .uri("/switch_language")
            .cookie(Cookie::new(LANG_COOKIE, "en"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        let cookie = resp
            .response()
            .cookies()
            .find(|cookie| cookie.name() == LANG_COOKIE)
            .map(|cookie| cookie.value().to_string());
        assert_eq!(cookie, Some("ar".to_string()));
    }

    #[actix_web::test]
    async fn test_local_edits() {
        let (state, store) = http_state(tracker());
        store
            .save(&[stored_case(1, "First"), stored_case(2, "Second")])
            .unwrap();
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/update_test_case")
            .set_json(json!({"id": 1, "title": "", "steps": [], "expected_result": ""}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::post()
            .uri("/update_test_case")
            .set_json(json!({"id": 1, "title": "Renamed", "steps": "raw", "expected_result": "x"}))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["updated"], true);
        assert_eq!(store.load().unwrap()[0].steps, Steps::Raw("raw".to_string()));

        let req = actix_test::TestRequest::post().uri("/delete_test_case/2").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["deleted"], true);
        assert_eq!(store.load().unwrap().len(), 1);

        let req = actix_test::TestRequest::post().uri("/delete_all_test_cases").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert!(store.load().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_push_identical_reports_no_changes() {
        let remote = stored_case(7001, "Login works");
        let (state, store) = http_state(tracker().with_linked_case(10, remote.clone()));
        store.save(&[remote]).unwrap();
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/push_to_azure")
            .set_json(json!({"story_id": "10"}))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], NO_CHANGES);
        assert_eq!(body["report"]["unchanged"], json!([7001]));
    }

    #[actix_web::test]
    async fn test_pull_validates_request() {
        let (state, store) = http_state(tracker().with_linked_case(10, stored_case(7001, "Remote")));
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/fetch_azure_test_cases")
            .insert_header(ContentType::plaintext())
            .set_payload(r#"{"story_id": 10}"#)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let req = actix_test::TestRequest::post()
            .uri("/fetch_azure_test_cases")
            .set_json(json!({}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::post()
            .uri("/fetch_azure_test_cases")
            .set_json(json!({"story_id": 999}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], PULL_FAILED);

        let req = actix_test::TestRequest::post()
            .uri("/fetch_azure_test_cases")
            .set_json(json!({"story_id": 10}))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["test_cases"][0]["id"], 7001);
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_browse_api_returns_bare_json() {
        let tracker = tracker()
            .with_project("p-1", "Shop")
            .with_linked_case(10, stored_case(7001, "Login works"));
        let (state, _) = http_state(tracker);
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/api/projects").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([{"id": "p-1", "name": "Shop"}]));

        let req = actix_test::TestRequest::get()
            .uri("/api/user_stories/p-1/2")
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["id"], 10);
        assert_eq!(body[0]["test_cases"][0]["title"], "Login works");

        let req = actix_test::TestRequest::get()
            .uri("/api/user_story_details/10")
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["title"], "Login");
        assert_eq!(body["test_cases"][0]["id"], 7001);
    }

    #[test]
    fn test_log_ring_keeps_last_entries() {
        let logs = Mutex::new(Vec::new());
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            add_log(&logs, "INFO", "Test", &format!("entry {}", i));
        }
        let logs = logs.lock().unwrap();
        assert_eq!(logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(logs[0].message, "entry 5");
    }
}
