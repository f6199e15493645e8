use serde::Serialize;

/// One unit of the progress/result stream of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GenerationEvent {
    Status { message: String },
    FinalCode { code: String, output: String },
    Error { message: String },
}

impl GenerationEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::FinalCode { .. } => "final_code",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Status { .. })
    }

    /// Encode as a server-sent-events record: `event: <kind>\ndata: <json>\n\n`.
    pub fn to_sse(&self) -> serde_json::Result<String> {
        Ok(format!(
            "event: {}\ndata: {}\n\n",
            self.kind(),
            serde_json::to_string(self)?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_records() {
        let status = GenerationEvent::status("Attempt 1/3: Generating code...");
        assert_eq!(
            status.to_sse().unwrap(),
            "event: status\ndata: {\"message\":\"Attempt 1/3: Generating code...\"}\n\n"
        );

        let final_code = GenerationEvent::FinalCode {
            code: "print(\"hi\")\n".to_string(),
            output: String::new(),
        };
        assert_eq!(
            final_code.to_sse().unwrap(),
            "event: final_code\ndata: {\"code\":\"print(\\\"hi\\\")\\n\",\"output\":\"\"}\n\n"
        );

        let error = GenerationEvent::error("Prompt is required");
        assert!(error.to_sse().unwrap().starts_with("event: error\n"));
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(!GenerationEvent::status("x").is_terminal());
        assert!(GenerationEvent::error("x").is_terminal());
        assert!(GenerationEvent::FinalCode {
            code: String::new(),
            output: String::new()
        }
        .is_terminal());
    }
}
