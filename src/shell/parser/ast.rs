use std::fmt;

use super::lexer::Quoting;

/// argv 中的一个单词，保留其引号上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub quoting: Quoting,
}

impl Word {
    pub fn new(text: impl Into<String>, quoting: Quoting) -> Self {
        Self {
            text: text.into(),
            quoting,
        }
    }

    /// 不经过展开阶段时传给进程的字面值。
    ///
    /// 非单引号单词的 `text` 中 `\\` 表示一个反斜杠，`\$` 表示保留下来的 `$`，
    /// 其余字符原样。
    pub fn literal(&self) -> String {
        if self.quoting == Quoting::Single {
            return self.text.clone();
        }
        let mut literal = String::with_capacity(self.text.len());
        let mut chars = self.text.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('\\', Some(&next @ ('\\' | '$'))) => {
                    chars.next();
                    literal.push(next);
                }
                _ => literal.push(c),
            }
        }
        literal
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::quote(&self.literal()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectKind {
    WriteTrunc(String),
    WriteAppend(String),
    Read(String),
    Dup(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub fd: u32,
    pub kind: RedirectKind,
}

impl Redirection {
    pub fn default_fd(kind: &RedirectKind) -> u32 {
        match kind {
            RedirectKind::Read(_) => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fd != Self::default_fd(&self.kind) {
            write!(f, "{}", self.fd)?;
        }
        match &self.kind {
            RedirectKind::WriteTrunc(path) => write!(f, "> {}", shell_words::quote(path)),
            RedirectKind::WriteAppend(path) => write!(f, ">> {}", shell_words::quote(path)),
            RedirectKind::Read(path) => write!(f, "< {}", shell_words::quote(path)),
            RedirectKind::Dup(target) => write!(f, ">&{}", target),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleCommand {
    pub argv: Vec<Word>,
    pub redirections: Vec<Redirection>,
}

impl SimpleCommand {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty() && self.redirections.is_empty()
    }

    pub fn program(&self) -> Option<String> {
        self.argv.first().map(Word::literal)
    }

    pub fn args(&self) -> Vec<String> {
        self.argv.iter().skip(1).map(Word::literal).collect()
    }
}

impl fmt::Display for SimpleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .argv
            .iter()
            .map(ToString::to_string)
            .chain(self.redirections.iter().map(ToString::to_string));
        for (i, part) in parts.enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&part)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<SimpleCommand>,
    pub background: bool,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", stage)?;
        }
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

/// 跟在某个 pipeline 之后的控制运算符，决定下一个单元是否执行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    Seq,
    And,
    Or,
    None,
}

impl Joiner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Joiner::Seq => ";",
            Joiner::And => "&&",
            Joiner::Or => "||",
            Joiner::None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceUnit {
    pub pipeline: Pipeline,
    pub joiner: Joiner,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    pub units: Vec<SequenceUnit>,
}

impl Sequence {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", unit.pipeline)?;
            match unit.joiner {
                Joiner::None => {}
                // `&` 本身已经分隔了两个单元
                Joiner::Seq if unit.pipeline.background => {}
                Joiner::Seq => f.write_str(";")?,
                joiner => write!(f, " {}", joiner.as_str())?,
            }
        }
        Ok(())
    }
}
