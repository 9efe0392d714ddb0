use super::ast::{RedirectKind, Redirection, SimpleCommand, Word};
use super::lexer::{Operator, Token};
use super::parser::ParseError;

fn operator_at(tokens: &[Token], pos: usize) -> Option<Operator> {
    tokens.get(pos).and_then(Token::as_operator)
}

/// `>&` 或者 `>` 紧跟 `&`（允许中间有空白）
fn is_dup_at(tokens: &[Token], pos: usize) -> bool {
    match operator_at(tokens, pos) {
        Some(Operator::GreatAnd) => true,
        Some(Operator::Great) => operator_at(tokens, pos + 1) == Some(Operator::Amp),
        _ => false,
    }
}

/// `>` 与 `&` 分成两个 token 的 dup 形式
fn is_split_dup_at(tokens: &[Token], pos: usize) -> bool {
    operator_at(tokens, pos) == Some(Operator::Great)
        && operator_at(tokens, pos + 1) == Some(Operator::Amp)
}

/// 当前位置是否开始一个重定向：重定向运算符，或者紧贴在重定向运算符前的纯数字单词。
///
/// 数字与运算符之间有空白时不视为 fd 前缀（`echo 10 > f`、`echo 1 >&2` 中的数字是参数），
/// 只有完全拆开的 `2 > & 1` 例外。
pub fn starts_redirection(tokens: &[Token], pos: usize) -> bool {
    let Some(token) = tokens.get(pos) else {
        return false;
    };
    if let Some(op) = token.as_operator() {
        return op.is_redirection();
    }
    if token.as_fd().is_none() {
        return false;
    }
    match tokens.get(pos + 1) {
        Some(next) if next.as_operator().is_some_and(|op| op.is_redirection()) => {
            !next.spaced || is_split_dup_at(tokens, pos + 1)
        }
        _ => false,
    }
}

/// 从 `pos` 开始解析一个重定向并追加到 `command`，返回新的位置。
/// 只是输入的纯函数，同样的 tokens 和位置总是得到同样的结果。
pub fn parse_redirection(
    tokens: &[Token],
    pos: usize,
    command: &mut SimpleCommand,
) -> Result<usize, ParseError> {
    let mut pos = pos;
    let explicit_fd = match tokens.get(pos) {
        Some(token) if token.is_word() => {
            pos += 1;
            token.as_fd()
        }
        _ => None,
    };

    let Some(op) = operator_at(tokens, pos) else {
        let text = tokens.get(pos).map(|t| t.text.clone()).unwrap_or_default();
        return Err(ParseError::UnexpectedToken(text));
    };

    if is_dup_at(tokens, pos) {
        pos += if op == Operator::GreatAnd { 1 } else { 2 };
        let target = tokens
            .get(pos)
            .and_then(Token::as_fd)
            .ok_or(ParseError::DupTarget)?;
        command.redirections.push(Redirection {
            fd: explicit_fd.unwrap_or(1),
            kind: RedirectKind::Dup(target),
        });
        return Ok(pos + 1);
    }

    let make: fn(String) -> RedirectKind = match op {
        Operator::Great => RedirectKind::WriteTrunc,
        Operator::DGreat => RedirectKind::WriteAppend,
        Operator::Less => RedirectKind::Read,
        Operator::DLess => return Err(ParseError::Unsupported(op.as_str().to_string())),
        Operator::GreatAnd
        | Operator::Semi
        | Operator::AndIf
        | Operator::OrIf
        | Operator::Pipe
        | Operator::Amp => return Err(ParseError::UnexpectedToken(op.as_str().to_string())),
    };

    let target = match tokens.get(pos + 1) {
        Some(token) if token.is_word() => Word::new(token.text.clone(), token.quoting).literal(),
        _ => return Err(ParseError::MissingTarget(op.as_str().to_string())),
    };
    let kind = make(target);
    command.redirections.push(Redirection {
        fd: explicit_fd.unwrap_or_else(|| Redirection::default_fd(&kind)),
        kind,
    });
    Ok(pos + 2)
}
