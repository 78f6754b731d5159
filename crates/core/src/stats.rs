use gemini_live_types::events::UsageMetadata;

/// Token usage accumulated over one live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    total_tokens: i64,
    prompt_tokens: i64,
    response_tokens: i64,
    reports: u32,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_usage(&mut self, usage: &UsageMetadata) {
        self.total_tokens += usage.total_token_count;
        self.prompt_tokens += usage.prompt_token_count;
        self.response_tokens += usage.response_token_count;
        self.reports += 1;
    }

    pub fn total_tokens(&self) -> i64 {
        self.total_tokens
    }

    pub fn prompt_tokens(&self) -> i64 {
        self.prompt_tokens
    }

    pub fn response_tokens(&self) -> i64 {
        self.response_tokens
    }

    pub fn reports(&self) -> u32 {
        self.reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut stats = Stats::new();
        let usage = UsageMetadata {
            prompt_token_count: 10,
            response_token_count: 30,
            total_token_count: 40,
        };

        stats.update_usage(&usage);
        stats.update_usage(&usage);

        assert_eq!(stats.total_tokens(), 80);
        assert_eq!(stats.prompt_tokens(), 20);
        assert_eq!(stats.response_tokens(), 60);
        assert_eq!(stats.reports(), 2);
    }
}
