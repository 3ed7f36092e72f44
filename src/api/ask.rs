use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::{Form, Json};

use crate::api::render::{render_page, PageView};
use crate::llm::completion::answer_question;
use crate::models::{AskForm, HealthResponse};
use crate::state::AppState;

const MAX_QUESTION_LEN: usize = 2000;

/// GET / — empty question form.
pub async fn index() -> Html<String> {
    Html(render_page(&PageView::default()))
}

/// POST / — answer the submitted question.
pub async fn ask(
    State(state): State<AppState>,
    Form(form): Form<AskForm>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let question = truncate_to_char_boundary(form.question.trim(), MAX_QUESTION_LEN);
    if question.is_empty() {
        return Ok(Html(render_page(&PageView::default())));
    }

    match answer_question(&state, &question, None).await {
        Ok(reply) => Ok(Html(render_page(&PageView {
            query: &question,
            answer: Some(&reply.answer),
            error: None,
        }))),
        Err(e) => {
            tracing::error!("Failed to answer question: {e:#}");
            let message = format!("Could not get an answer: {e:#}");
            Err((
                StatusCode::BAD_GATEWAY,
                Html(render_page(&PageView {
                    query: &question,
                    answer: None,
                    error: Some(&message),
                })),
            ))
        }
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        vector_entries: state.retriever.vectors.entry_count(),
        bm25_docs: state.retriever.bm25.doc_count(),
        built_at: state.manifest.as_ref().map(|m| m.built_at),
    })
}

pub(crate) fn truncate_to_char_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    s.char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= max_len)
        .map(|(_, c)| c)
        .collect()
}
