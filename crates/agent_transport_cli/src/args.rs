use agent_protocol::QueryRequest;

/// Per-turn command line for a print-mode, stream-json agent run.
///
/// `default_model` is used when the request names no model. The prompt comes
/// last, after `--`, so a prompt starting with `-` is never read as an option.
#[must_use]
pub fn build_args(request: &QueryRequest, default_model: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--include-partial-messages".to_string(),
    ];

    let allowed_tools: Vec<&str> = request
        .allowed_tools
        .iter()
        .map(|tool| tool.trim())
        .filter(|tool| !tool.is_empty())
        .collect();
    if !allowed_tools.is_empty() {
        args.push("--allowedTools".to_string());
        args.push(allowed_tools.join(","));
    }

    if let Some(model) = non_blank(request.model.as_deref()).or(non_blank(default_model)) {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    if let Some(session_id) = non_blank(request.resume_session_id.as_deref()) {
        args.push("--resume".to_string());
        args.push(session_id.to_string());
    }

    args.push("--".to_string());
    args.push(request.prompt.clone());
    args
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
