/// Output of a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub command: String,
    pub result: String,
    pub failed: bool,
}

impl Reply {
    pub fn new(command: impl Into<String>, result: impl Into<String>, failed: bool) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            failed,
        }
    }
}

/// Output of a config batch; `result` is every command followed by its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReply {
    pub failed: bool,
    pub result: String,
    pub replies: Vec<Reply>,
}

impl BatchReply {
    pub fn from_replies(replies: Vec<Reply>) -> Self {
        let failed = replies.iter().any(|reply| reply.failed);
        let result = replies
            .iter()
            .map(|reply| {
                if reply.result.is_empty() {
                    reply.command.clone()
                } else {
                    format!("{}\n{}", reply.command, reply.result)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            failed,
            result,
            replies,
        }
    }
}
