use crate::cli::args::CliArgs;

pub fn parse_delimiter(raw: &str) -> Result<u8, String> {
    let value = match raw {
        "\\t" | "tab" => "\t",
        other => other,
    };
    match value.as_bytes() {
        [b] if *b != b'\n' && *b != b'\r' => Ok(*b),
        [_] => Err("line breaks cannot be used as a delimiter".to_string()),
        _ => Err("expected a single-byte character".to_string()),
    }
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(size) = args.page_size {
        if size == 0 {
            return Err("invalid page-size, expected positive integer".to_string());
        }
    }
    if let Some(interval) = args.interval {
        if interval == 0 {
            return Err("invalid interval, expected positive number of milliseconds".to_string());
        }
    }
    if let Some(max_polls) = args.max_polls {
        if max_polls == 0 {
            return Err("invalid max-polls, expected positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive number of seconds".to_string());
        }
    }
    if let Some(raw) = args.delimiter.as_deref() {
        parse_delimiter(raw).map_err(|e| format!("invalid --delimiter '{raw}': {e}"))?;
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text, json, csv or xml"
            ));
        }
    }
    if let Some(raw) = args.url.as_deref() {
        reqwest::Url::parse(raw.trim()).map_err(|e| format!("invalid --url '{raw}': {e}"))?;
    }
    Ok(())
}
