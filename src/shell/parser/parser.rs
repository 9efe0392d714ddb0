use thiserror::Error;

use super::ast::{Joiner, Pipeline, Sequence, SequenceUnit, SimpleCommand, Word};
use super::lexer::{Lexer, Operator, Token, TokenKind};
use super::redirect::{parse_redirection, starts_redirection};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error: empty command")]
    EmptyCommand,
    #[error("syntax error: missing command after '|'")]
    MissingPipeCommand,
    #[error("syntax error: unexpected end of input after '{0}'")]
    DanglingOperator(String),
    #[error("syntax error: redirection missing target after '{0}'")]
    MissingTarget(String),
    #[error("syntax error: dup redirection requires numeric fd target")]
    DupTarget,
    #[error("syntax error: unsupported operator '{0}'")]
    Unsupported(String),
    #[error("syntax error near unexpected token '{0}'")]
    UnexpectedToken(String),
}

/// 单遍递归下降解析，位置只前进不回溯
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Self::from_tokens(Lexer::new(input).tokenize())
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_operator(&self) -> Option<Operator> {
        self.peek().and_then(Token::as_operator)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn next_token(&mut self) {
        self.pos += 1;
    }

    pub fn parse_sequence(&mut self) -> Result<Sequence, ParseError> {
        let mut sequence = Sequence::default();

        while !self.at_end() {
            let pipeline = self.parse_pipeline()?;

            let mut joiner = match self.peek_operator() {
                Some(Operator::Semi) => Joiner::Seq,
                Some(Operator::AndIf) => Joiner::And,
                Some(Operator::OrIf) => Joiner::Or,
                _ => Joiner::None,
            };

            if pipeline.background && joiner != Joiner::None {
                // `a & && b`、`a & ; b`：后台运算符后不能再跟连接符
                return Err(ParseError::UnexpectedToken(joiner.as_str().to_string()));
            } else if joiner != Joiner::None {
                self.next_token();
                if self.at_end() {
                    return Err(ParseError::DanglingOperator(joiner.as_str().to_string()));
                }
            } else if pipeline.background && !self.at_end() {
                // `a & b`：后台运算符本身也起分隔作用
                joiner = Joiner::Seq;
            } else if let Some(token) = self.peek() {
                return Err(ParseError::UnexpectedToken(token.text.clone()));
            }

            sequence.units.push(SequenceUnit { pipeline, joiner });
        }

        Ok(sequence)
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let mut stages = vec![self.parse_simple_command()?];

        while self.peek_operator() == Some(Operator::Pipe) {
            self.next_token();
            let stage = match self.parse_simple_command() {
                Err(ParseError::EmptyCommand) => return Err(ParseError::MissingPipeCommand),
                Ok(stage) if stage.argv.is_empty() => return Err(ParseError::MissingPipeCommand),
                other => other?,
            };
            stages.push(stage);
        }

        let mut background = false;
        if self.peek_operator() == Some(Operator::Amp) {
            self.next_token();
            background = true;
        }

        Ok(Pipeline { stages, background })
    }

    fn parse_simple_command(&mut self) -> Result<SimpleCommand, ParseError> {
        let mut command = SimpleCommand::default();

        loop {
            if starts_redirection(&self.tokens, self.pos) {
                self.pos = parse_redirection(&self.tokens, self.pos, &mut command)?;
                continue;
            }
            let Some(token) = self.peek() else {
                break;
            };
            match token.kind {
                TokenKind::Word => {
                    command.argv.push(Word::new(token.text.clone(), token.quoting));
                    self.next_token();
                }
                TokenKind::Operator(
                    Operator::Semi
                    | Operator::AndIf
                    | Operator::OrIf
                    | Operator::Pipe
                    | Operator::Amp,
                ) => break,
                TokenKind::Operator(
                    op @ (Operator::Less
                    | Operator::Great
                    | Operator::DGreat
                    | Operator::DLess
                    | Operator::GreatAnd),
                ) => return Err(ParseError::UnexpectedToken(op.as_str().to_string())),
            }
        }

        if command.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(command)
    }
}

pub fn parse(line: &str) -> Result<Sequence, ParseError> {
    Parser::new(line).parse_sequence()
}
