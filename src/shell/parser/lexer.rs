use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// 单词的引号上下文，供后续的变量展开阶段判断哪些单词不参与替换
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Quoting {
    #[default]
    Unquoted,
    Single,
    Double,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    Semi,     // ;
    AndIf,    // &&
    OrIf,     // ||
    Pipe,     // |
    Amp,      // &
    Less,     // <
    Great,    // >
    DGreat,   // >>
    DLess,    // <<
    GreatAnd, // >&
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Semi => ";",
            Operator::AndIf => "&&",
            Operator::OrIf => "||",
            Operator::Pipe => "|",
            Operator::Amp => "&",
            Operator::Less => "<",
            Operator::Great => ">",
            Operator::DGreat => ">>",
            Operator::DLess => "<<",
            Operator::GreatAnd => ">&",
        }
    }

    pub fn is_redirection(&self) -> bool {
        matches!(
            self,
            Operator::Less | Operator::Great | Operator::DGreat | Operator::DLess | Operator::GreatAnd
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Word,
    Operator(Operator),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub quoting: Quoting,
    /// 前面是否有空白（或位于行首），用于区分 `1>f` 与 `echo 1 > f`
    pub spaced: bool,
}

impl Token {
    pub fn word(text: impl Into<String>, quoting: Quoting, spaced: bool) -> Self {
        Self {
            kind: TokenKind::Word,
            text: text.into(),
            quoting,
            spaced,
        }
    }

    pub fn operator(op: Operator, spaced: bool) -> Self {
        Self {
            kind: TokenKind::Operator(op),
            text: op.as_str().to_string(),
            quoting: Quoting::Unquoted,
            spaced,
        }
    }

    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }

    pub fn as_operator(&self) -> Option<Operator> {
        match self.kind {
            TokenKind::Operator(op) => Some(op),
            TokenKind::Word => None,
        }
    }

    /// 未加引号的纯数字单词，可作为文件描述符
    pub fn as_fd(&self) -> Option<u32> {
        if self.kind != TokenKind::Word || self.quoting != Quoting::Unquoted {
            return None;
        }
        if self.text.is_empty() || !self.text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.text.parse().ok()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Default)]
struct WordBuffer {
    text: String,
    started: bool,
    unquoted: bool,
    single: bool,
    double: bool,
}

impl WordBuffer {
    fn mark(&mut self, quoting: Quoting) {
        self.started = true;
        match quoting {
            Quoting::Unquoted => self.unquoted = true,
            Quoting::Single => self.single = true,
            Quoting::Double => self.double = true,
        }
    }

    /// 字面反斜杠记为 `\\`，与保留的 `\$` 区分开
    fn push(&mut self, c: char, quoting: Quoting) {
        self.mark(quoting);
        if c == '\\' {
            self.text.push('\\');
        }
        self.text.push(c);
    }

    /// 保留给展开阶段的 `\$`
    fn push_escaped_dollar(&mut self, quoting: Quoting) {
        self.mark(quoting);
        self.text.push_str("\\$");
    }

    // 混合引号的单词按未加引号处理
    fn quoting(&self) -> Quoting {
        match (self.unquoted, self.single, self.double) {
            (false, true, false) => Quoting::Single,
            (false, false, true) => Quoting::Double,
            _ => Quoting::Unquoted,
        }
    }

    fn take(&mut self, spaced: bool) -> Option<Token> {
        if !self.started {
            return None;
        }
        let quoting = self.quoting();
        let mut text = std::mem::take(&mut self.text);
        if quoting == Quoting::Single {
            // 纯单引号单词没有转义，直接保存原文
            text = text.replace("\\\\", "\\");
        }
        *self = WordBuffer::default();
        Some(Token::word(text, quoting, spaced))
    }
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    tokens: Vec<Token>,
    word: WordBuffer,
    spaced: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            tokens: Vec::new(),
            word: WordBuffer::default(),
            spaced: true,
        }
    }

    /// 全函数：任何输入都会得到一个 token 序列，未闭合的引号在行尾自动闭合
    pub fn tokenize(mut self) -> Vec<Token> {
        while let Some(c) = self.read_char() {
            match c {
                c if c.is_whitespace() => {
                    self.flush_word();
                    self.spaced = true;
                }
                '\'' => self.read_single_quoted(),
                '"' => self.read_double_quoted(),
                '\\' => self.read_escape(),
                '|' | '&' | ';' | '<' | '>' => {
                    self.flush_word();
                    let op = self.read_operator(c);
                    self.push_token(Token::operator(op, self.spaced));
                }
                c => self.word.push(c, Quoting::Unquoted),
            }
        }
        self.flush_word();
        self.tokens
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn push_token(&mut self, token: Token) {
        self.tokens.push(token);
        self.spaced = false;
    }

    fn flush_word(&mut self) {
        if let Some(token) = self.word.take(self.spaced) {
            self.push_token(token);
        }
    }

    fn read_operator(&mut self, first: char) -> Operator {
        let combined = match (first, self.peek_char()) {
            ('&', Some('&')) => Some(Operator::AndIf),
            ('|', Some('|')) => Some(Operator::OrIf),
            ('>', Some('>')) => Some(Operator::DGreat),
            ('<', Some('<')) => Some(Operator::DLess),
            ('>', Some('&')) => Some(Operator::GreatAnd),
            _ => None,
        };
        if let Some(op) = combined {
            self.read_char();
            return op;
        }
        match first {
            '|' => Operator::Pipe,
            '&' => Operator::Amp,
            ';' => Operator::Semi,
            '<' => Operator::Less,
            _ => Operator::Great,
        }
    }

    fn read_single_quoted(&mut self) {
        self.word.mark(Quoting::Single);
        while let Some(c) = self.read_char() {
            if c == '\'' {
                return;
            }
            self.word.push(c, Quoting::Single);
        }
    }

    fn read_double_quoted(&mut self) {
        self.word.mark(Quoting::Double);
        while let Some(c) = self.read_char() {
            match c {
                '"' => return,
                '\\' => match self.peek_char() {
                    // `\$` 原样保留，交给展开阶段处理
                    Some('$') => {
                        self.read_char();
                        self.word.push_escaped_dollar(Quoting::Double);
                    }
                    Some(next @ ('"' | '\\' | '`')) => {
                        self.read_char();
                        self.word.push(next, Quoting::Double);
                    }
                    Some('\n') => {
                        self.read_char();
                    }
                    _ => self.word.push('\\', Quoting::Double),
                },
                c => self.word.push(c, Quoting::Double),
            }
        }
    }

    fn read_escape(&mut self) {
        match self.read_char() {
            Some('$') => self.word.push_escaped_dollar(Quoting::Unquoted),
            Some('\n') => {}
            Some(c) => self.word.push(c, Quoting::Unquoted),
            None => self.word.push('\\', Quoting::Unquoted),
        }
    }
}

pub fn tokenize(line: &str) -> Vec<Token> {
    Lexer::new(line).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::ast::Word;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_simple_command() {
        let tokens = tokenize("ls -l");
        assert_eq!(texts(&tokens), vec!["ls", "-l"]);
        assert!(tokens.iter().all(Token::is_word));
    }

    #[test]
    fn test_empty_line() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t ").is_empty());
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("a && b || c | d & e ; f");
        let ops: Vec<Operator> = tokens.iter().filter_map(Token::as_operator).collect();
        assert_eq!(
            ops,
            vec![
                Operator::AndIf,
                Operator::OrIf,
                Operator::Pipe,
                Operator::Amp,
                Operator::Semi
            ]
        );
    }

    #[test]
    fn test_operators_without_spaces() {
        let tokens = tokenize("a&&b>>c<<d>&2");
        assert_eq!(texts(&tokens), vec!["a", "&&", "b", ">>", "c", "<<", "d", ">&", "2"]);
    }

    #[test]
    fn test_unmatched_combination_falls_back() {
        let tokens = tokenize("a |& b");
        assert_eq!(
            tokens.iter().filter_map(Token::as_operator).collect::<Vec<_>>(),
            vec![Operator::Pipe, Operator::Amp]
        );
    }

    #[test]
    fn test_single_quoted_pipe_is_one_word() {
        let tokens = tokenize("echo 'a|b'");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1], Token::word("a|b", Quoting::Single, true));
    }

    #[test]
    fn test_double_quoted_keeps_escaped_dollar() {
        let tokens = tokenize(r#"echo "cost \$5 \"x\"""#);
        assert_eq!(tokens[1].text, r#"cost \$5 "x""#);
        assert_eq!(tokens[1].quoting, Quoting::Double);
    }

    #[test]
    fn test_escaped_backslash_before_dollar() {
        let tokens = tokenize(r#"printf "a\\$" \\$ \$x "\$y""#);
        let literals: Vec<String> = tokens
            .iter()
            .map(|t| Word::new(t.text.clone(), t.quoting).literal())
            .collect();
        assert_eq!(literals, vec!["printf", r"a\$", r"\$", "$x", "$y"]);
        assert_eq!(tokens[3].text, r"\$x");
        assert_eq!(tokens[4].text, r"\$y");
    }

    #[test]
    fn test_single_quotes_are_literal() {
        let tokens = tokenize(r"echo 'a\b' '$x'");
        assert_eq!(tokens[1].text, r"a\b");
        assert_eq!(tokens[2].text, "$x");
    }

    #[test]
    fn test_mixed_quoting_is_unquoted() {
        let tokens = tokenize(r#"a'b'"c" 'x'"y""#);
        assert_eq!(tokens[0].text, "abc");
        assert_eq!(tokens[0].quoting, Quoting::Unquoted);
        assert_eq!(tokens[1].text, "xy");
        assert_eq!(tokens[1].quoting, Quoting::Unquoted);
    }

    #[test]
    fn test_empty_quotes_produce_word() {
        let tokens = tokenize("printf '' \"\"");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], Token::word("", Quoting::Single, true));
        assert_eq!(tokens[2], Token::word("", Quoting::Double, true));
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        let tokens = tokenize("echo 'abc | def");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "abc | def");
        assert_eq!(tokens[1].quoting, Quoting::Single);
    }

    #[test]
    fn test_escape_prevents_operator_split() {
        let tokens = tokenize(r"echo a\|b \; c\ d");
        assert_eq!(texts(&tokens), vec!["echo", "a|b", ";", "c d"]);
        assert!(tokens.iter().all(Token::is_word));
    }

    #[test]
    fn test_spacing_is_recorded() {
        let tokens = tokenize("echo 1>f 2 > g");
        let spaced: Vec<bool> = tokens.iter().map(|t| t.spaced).collect();
        assert_eq!(spaced, vec![true, true, false, false, true, true, true]);
    }

    #[test]
    fn test_as_fd() {
        assert_eq!(Token::word("2", Quoting::Unquoted, true).as_fd(), Some(2));
        assert_eq!(Token::word("2", Quoting::Single, true).as_fd(), None);
        assert_eq!(Token::word("2a", Quoting::Unquoted, true).as_fd(), None);
        assert_eq!(Token::word("99999999999", Quoting::Unquoted, true).as_fd(), None);
    }

    #[test]
    fn test_round_trip_without_quotes() {
        let line = "  cat   a.txt |grep  -v x>out;  echo done&&true ";
        let joined = texts(&tokenize(line)).join(" ");
        assert_eq!(joined, "cat a.txt | grep -v x > out ; echo done && true");
    }
}
