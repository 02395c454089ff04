//! System prompt assembly (§4.F step 4): runtime information, prompt
//! files, memory file, daily memory, built-in skill descriptions.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use relay_core::{AgentId, Message};

/// Per-file size cap (characters).
const MAX_FILE_CHARS: usize = 20_000;
/// Total cap for all prompt files combined (characters).
const MAX_TOTAL_CHARS: usize = 100_000;

/// Prompt files read from the workspace root, in this fixed order; missing
/// files are logged but not fatal.
const PROMPT_FILES: &[&str] = &["SOUL.md", "IDENTITY.md", "AGENTS.md", "USER.md", "TOOLS.md"];

/// Context available when constructing the runtime-information block; the
/// channel fields are only present for a turn that actually came through a
/// channel (cron-synthesised turns may omit them).
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext<'a> {
    pub channel_type: Option<&'a str>,
    pub channel_id: Option<&'a str>,
    pub chat_id: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

impl<'a> RuntimeContext<'a> {
    pub fn from_message(msg: &'a Message) -> Self {
        Self {
            channel_type: Some(msg.channel_type.as_str()),
            channel_id: Some(&msg.channel_id),
            chat_id: Some(&msg.chat_id),
            user_id: Some(&msg.user_id),
        }
    }
}

/// Assembles the full system prompt text for one turn.
pub struct PromptBuilder {
    agent_id: AgentId,
    workspace: PathBuf,
}

impl PromptBuilder {
    pub fn new(agent_id: AgentId, workspace: impl Into<PathBuf>) -> Self {
        Self {
            agent_id,
            workspace: workspace.into(),
        }
    }

    /// Build the `[system]` prompt: runtime info, prompt files, memory
    /// file, daily memory (yesterday + today), built-in skill descriptions.
    pub fn build(&self, ctx: &RuntimeContext<'_>, skills: &[(String, String)]) -> String {
        let mut out = String::new();

        out.push_str(&self.runtime_info_block(ctx));

        if let Some(files) = self.load_prompt_files() {
            out.push_str("\n\n");
            out.push_str(&files);
        }

        if let Some(memory) = read_and_truncate(&self.workspace.join("memory").join("MEMORY.md")) {
            out.push_str("\n\n---\n\n## Memory\n\n");
            out.push_str(&memory);
        }

        if let Some(daily) = self.daily_memory_block() {
            out.push_str("\n\n---\n\n## Recent memory\n\n");
            out.push_str(&daily);
        }

        if !skills.is_empty() {
            out.push_str("\n\n---\n\n## Available tools\n\n");
            for (name, description) in skills {
                out.push_str(&format!("- **{name}**: {description}\n"));
            }
        }

        out
    }

    fn runtime_info_block(&self, ctx: &RuntimeContext<'_>) -> String {
        let mut lines = vec![
            "## Runtime information".to_string(),
            format!("- Agent: {}", self.agent_id),
            format!("- Workspace: {}", self.workspace.display()),
            format!("- Version: {}", env!("CARGO_PKG_VERSION")),
            format!("- Platform: {}", std::env::consts::OS),
            format!("- Shell: {}", default_shell()),
            format!("- Time: {}", Utc::now().to_rfc3339()),
        ];
        if let Some(channel_type) = ctx.channel_type {
            lines.push(format!("- Channel type: {channel_type}"));
        }
        if let Some(channel_id) = ctx.channel_id {
            lines.push(format!("- Channel id: {channel_id}"));
        }
        if let Some(chat_id) = ctx.chat_id {
            lines.push(format!("- Chat id: {chat_id}"));
        }
        if let Some(user_id) = ctx.user_id {
            lines.push(format!("- User id: {user_id}"));
        }
        lines.join("\n")
    }

    fn load_prompt_files(&self) -> Option<String> {
        let mut sections: Vec<(&str, String)> = Vec::new();
        let mut total_chars = 0usize;

        for &name in PROMPT_FILES {
            let path = self.workspace.join(name);
            if let Some(content) = read_and_truncate(&path) {
                if total_chars + content.len() > MAX_TOTAL_CHARS {
                    break;
                }
                total_chars += content.len();
                sections.push((name, content));
            }
        }

        if sections.is_empty() {
            return None;
        }

        let mut out = String::with_capacity(total_chars + sections.len() * 16);
        for (name, content) in &sections {
            if !out.is_empty() {
                out.push_str("\n\n---\n\n");
            }
            out.push_str(&format!("## {name}\n\n{content}"));
        }
        Some(out)
    }

    /// Yesterday's and today's `memory/daily/YYYY-MM-DD.md`; each is
    /// skipped silently if absent.
    fn daily_memory_block(&self) -> Option<String> {
        let today = Utc::now().date_naive();
        let yesterday = today - chrono::Duration::days(1);
        let daily_dir = self.workspace.join("memory").join("daily");

        let mut out = String::new();
        for date in [yesterday, today] {
            let path = daily_dir.join(format!("{}.md", date.format("%Y-%m-%d")));
            if let Some(content) = read_and_truncate(&path) {
                if !out.is_empty() {
                    out.push_str("\n\n");
                }
                out.push_str(&format!("### {}\n\n{}", date.format("%Y-%m-%d"), content));
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

fn read_and_truncate(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to read prompt file");
            }
        })
        .ok()?;

    if content.trim().is_empty() {
        return None;
    }

    Some(truncate_content(&content, MAX_FILE_CHARS))
}

/// Truncate to `max_chars` using a 70% head / 20% tail split, breaking on
/// line boundaries so multi-byte content is never split mid-character.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }

    let head_chars = max_chars * 70 / 100;
    let tail_chars = max_chars * 20 / 100;
    let marker = "\n\n[... content truncated ...]\n\n";

    let head_end = content[..head_chars]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(head_chars);
    let tail_start = if content.len() > tail_chars {
        content[(content.len() - tail_chars)..]
            .find('\n')
            .map(|i| content.len() - tail_chars + i + 1)
            .unwrap_or(content.len() - tail_chars)
    } else {
        0
    };

    let mut out = String::with_capacity(head_end + marker.len() + (content.len() - tail_start));
    out.push_str(&content[..head_end]);
    out.push_str(marker);
    out.push_str(&content[tail_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::ChannelType;
    use std::fs;

    fn workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn includes_runtime_info_and_prompt_files_in_order() {
        let dir = workspace(&[("SOUL.md", "soul content"), ("AGENTS.md", "agents content")]);
        let builder = PromptBuilder::new(AgentId::new("main"), dir.path());
        let msg = Message::new("m1", "tg1", ChannelType::Telegram, "u1", "c1", "hi");
        let ctx = RuntimeContext::from_message(&msg);

        let prompt = builder.build(&ctx, &[]);

        assert!(prompt.contains("## Runtime information"));
        assert!(prompt.contains("Channel type: telegram"));
        let soul_pos = prompt.find("soul content").unwrap();
        let agents_pos = prompt.find("agents content").unwrap();
        assert!(soul_pos < agents_pos);
    }

    #[test]
    fn missing_prompt_files_are_silently_skipped() {
        let dir = workspace(&[]);
        let builder = PromptBuilder::new(AgentId::new("main"), dir.path());
        let prompt = builder.build(&RuntimeContext::default(), &[]);
        assert!(!prompt.contains("## SOUL.md"));
    }

    #[test]
    fn includes_memory_file_and_skill_descriptions() {
        let dir = workspace(&[("memory/MEMORY.md", "remember this")]);
        let builder = PromptBuilder::new(AgentId::new("main"), dir.path());
        let prompt = builder.build(
            &RuntimeContext::default(),
            &[("read_file".to_string(), "reads a file".to_string())],
        );
        assert!(prompt.contains("remember this"));
        assert!(prompt.contains("read_file"));
    }

    #[test]
    fn truncate_preserves_small_content() {
        let content = "line one\nline two";
        assert_eq!(truncate_content(content, MAX_FILE_CHARS), content);
    }

    #[test]
    fn truncate_applies_head_tail_split() {
        let content = (0..200).map(|i| format!("line {i}\n")).collect::<String>();
        let result = truncate_content(&content, 200);
        assert!(result.contains("[... content truncated ...]"));
        assert!(result.len() < content.len());
    }
}
