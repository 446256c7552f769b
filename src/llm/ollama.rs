//! Ollama preflight: confirm the server is up and every configured model is
//! present, pulling missing models when allowed.

use std::time::Duration;

use crate::error::AgentError;

/// Validate that Ollama is running and each model is available.
///
/// Step 1: HTTP GET to `{base_url}/` with 5-second timeout.
/// Step 2: HTTP POST to `{base_url}/api/show` for each distinct model.
/// Step 3: for missing models, POST `{base_url}/api/pull` when `auto_pull`.
pub async fn ensure_models(
    base_url: &str,
    models: &[&str],
    auto_pull: bool,
) -> Result<(), AgentError> {
    let http = reqwest::Client::new();
    let base_url = base_url.trim_end_matches('/');

    let root = format!("{base_url}/");
    http.get(&root)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| AgentError::OllamaUnavailable {
            url: root.clone(),
            message: format!("Is Ollama running? {e}"),
        })?;

    let mut seen: Vec<&str> = Vec::new();
    for &model in models {
        if seen.contains(&model) {
            continue;
        }
        seen.push(model);

        tracing::info!(model, "Checking for model");
        if model_available(&http, base_url, model).await? {
            continue;
        }

        if !auto_pull {
            return Err(AgentError::ModelNotAvailable {
                model: model.to_string(),
                message: format!("Run `ollama pull {model}` to download it."),
            });
        }

        tracing::info!(model, "Pulling model from ollama");
        pull_model(&http, base_url, model).await?;
    }

    Ok(())
}

async fn model_available(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
) -> Result<bool, AgentError> {
    let resp = http
        .post(format!("{base_url}/api/show"))
        .json(&serde_json::json!({ "model": model }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| AgentError::ModelNotAvailable {
            model: model.to_string(),
            message: format!("Failed to query model info: {e}"),
        })?;
    Ok(resp.status().is_success())
}

async fn pull_model(http: &reqwest::Client, base_url: &str, model: &str) -> Result<(), AgentError> {
    // Non-streaming pull blocks until the download finishes.
    let resp = http
        .post(format!("{base_url}/api/pull"))
        .json(&serde_json::json!({ "model": model, "stream": false }))
        .send()
        .await
        .map_err(|e| AgentError::ModelNotAvailable {
            model: model.to_string(),
            message: format!("Pull request failed: {e}"),
        })?;

    if !resp.status().is_success() {
        return Err(AgentError::ModelNotAvailable {
            model: model.to_string(),
            message: format!("Pull failed (HTTP {})", resp.status()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_server_reports_unavailable() {
        // Port 9 (discard) is essentially never an HTTP server.
        let err = ensure_models("http://127.0.0.1:9", &["llama3"], false)
            .await
            .unwrap_err();
        match err {
            AgentError::OllamaUnavailable { url, .. } => {
                assert_eq!(url, "http://127.0.0.1:9/");
            }
            other => panic!("Expected OllamaUnavailable, got: {other}"),
        }
    }
}
