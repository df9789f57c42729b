//! P. The grammar DSL parser: scanner-based lexer, recursive-descent parser,
//! forward-reference resolution via a placeholder-then-swap symbol table.

pub mod lexer;

use crate::error::ParseError;
use crate::token::sequence::SequenceHandle;
use crate::token::{Token, TokenKind, TokenRef};
use lexer::{lex, Lexeme, Tok};
use std::collections::HashMap;

pub struct ParseOptions {
    pub max_repeat: usize,
    pub seed: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_repeat: 2,
            seed: 0,
        }
    }
}

/// Parse a grammar file and return the token addressed as `START`.
pub fn parse_tavor(input: &str, opts: &ParseOptions) -> Result<TokenRef, ParseError> {
    let toks = lex(input)?;
    let mut p = Parser {
        toks,
        pos: 0,
        symtab: HashMap::new(),
        sequences: HashMap::new(),
        defined: HashMap::new(),
        used: HashMap::new(),
        max_repeat: opts.max_repeat.max(1),
        seed_counter: opts.seed,
    };
    p.parse_global()?;
    p.check_completion()
}

struct Parser {
    toks: Vec<Lexeme>,
    pos: usize,
    symtab: HashMap<String, TokenRef>,
    sequences: HashMap<String, SequenceHandle>,
    /// Name -> line where the definition completed.
    defined: HashMap<String, usize>,
    /// Name -> line of first reference.
    used: HashMap<String, usize>,
    max_repeat: usize,
    seed_counter: u64,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let i = (self.pos + offset).min(self.toks.len() - 1);
        &self.toks[i].tok
    }

    fn line(&self) -> usize {
        self.toks[self.pos.min(self.toks.len() - 1)].line
    }

    fn advance(&mut self) -> Tok {
        let t = self.toks[self.pos.min(self.toks.len() - 1)].tok.clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Tok::Newline) {
            self.advance();
        }
    }

    fn expect_char(&mut self, c: char) -> Result<(), ParseError> {
        match self.peek().clone() {
            Tok::Char(found) if found == c => {
                self.advance();
                Ok(())
            }
            other => Err(ParseError::ExpectRune {
                line: self.line(),
                expected: c,
                found: tok_char(&other),
            }),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Tok::Ident(s) => Ok(s),
            other => Err(ParseError::ExpectRune {
                line: self.line(),
                expected: 'I',
                found: tok_char(&other),
            }),
        }
    }

    fn expect_int(&mut self) -> Result<i64, ParseError> {
        match self.advance() {
            Tok::Int(v) => Ok(v),
            other => Err(ParseError::ExpectRune {
                line: self.line(),
                expected: '0',
                found: tok_char(&other),
            }),
        }
    }

    fn expect_newline(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Tok::Newline => {
                self.advance();
                Ok(())
            }
            Tok::Eof => Ok(()),
            _ => Err(ParseError::NewLineNeeded { line: self.line() }),
        }
    }

    fn next_seed(&mut self) -> u64 {
        self.seed_counter = self.seed_counter.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.seed_counter
    }

    fn placeholder(&mut self, name: &str) -> TokenRef {
        if let Some(tok) = self.symtab.get(name) {
            return tok.clone();
        }
        let tok = crate::token::Token::const_str(String::new());
        self.symtab.insert(name.to_string(), tok.clone());
        tok
    }

    fn parse_global(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_newlines();
            match self.peek().clone() {
                Tok::Eof => break,
                Tok::Char('$') => self.parse_special_def()?,
                Tok::Ident(name) => self.parse_token_def(name)?,
                other => {
                    return Err(ParseError::ExpectRune {
                        line: self.line(),
                        expected: '=',
                        found: tok_char(&other),
                    })
                }
            }
        }
        Ok(())
    }

    fn parse_token_def(&mut self, name: String) -> Result<(), ParseError> {
        self.advance(); // consume the ident we peeked
        if self.defined.contains_key(&name) {
            return Err(ParseError::TokenAlreadyDefined {
                line: self.line(),
                name,
            });
        }
        if !is_valid_name(&name) {
            return Err(ParseError::InvalidTokenName {
                line: self.line(),
                name,
            });
        }
        self.expect_char('=')?;
        let slot = self.placeholder(&name);
        let body = self
            .parse_scope()
            .map_err(|e| patch_empty_name(e, &name))?;
        self.expect_newline()?;
        swap_into_placeholder(&slot, &body, &name);
        self.defined.insert(name, self.line());
        Ok(())
    }

    fn parse_special_def(&mut self) -> Result<(), ParseError> {
        let line = self.line();
        self.expect_char('$')?;
        let name = self.expect_ident()?;
        if self.defined.contains_key(&name) || self.sequences.contains_key(&name) {
            return Err(ParseError::TokenAlreadyDefined { line, name });
        }
        let kind_name = self.expect_ident()?;
        self.expect_char('=')?;
        let args = self.parse_arglist()?;

        match kind_name.as_str() {
            "Int" => {
                let from = args.get("from");
                let to = args.get("to");
                match (from, to) {
                    (Some(f), Some(t)) => {
                        let f = as_int(f, "from", line)?;
                        let t = as_int(t, "to", line)?;
                        let tok = Token::range_int(f, t);
                        tok.lock().unwrap().name = Some(name.clone());
                        self.symtab.insert(name.clone(), tok);
                    }
                    (None, None) => {
                        let seed = self.next_seed();
                        let tok = Token::random_int(0, 1_000_000_000, seed);
                        tok.lock().unwrap().name = Some(name.clone());
                        self.symtab.insert(name.clone(), tok);
                    }
                    (None, Some(_)) => {
                        return Err(ParseError::MissingSpecialTokenArgument {
                            line,
                            kind: "Int".to_string(),
                            arg: "from".to_string(),
                        })
                    }
                    (Some(_), None) => {
                        return Err(ParseError::MissingSpecialTokenArgument {
                            line,
                            kind: "Int".to_string(),
                            arg: "to".to_string(),
                        })
                    }
                }
                for key in args.keys() {
                    if key != "from" && key != "to" {
                        return Err(ParseError::UnknownSpecialTokenArgument {
                            line,
                            kind: "Int".to_string(),
                            arg: key.clone(),
                        });
                    }
                }
            }
            "Sequence" => {
                let start = match args.get("start") {
                    Some(v) => as_int(v, "start", line)?,
                    None => 1,
                };
                let step = match args.get("step") {
                    Some(v) => as_int(v, "step", line)?,
                    None => 1,
                };
                for key in args.keys() {
                    if key != "start" && key != "step" {
                        return Err(ParseError::UnknownSpecialTokenArgument {
                            line,
                            kind: "Sequence".to_string(),
                            arg: key.clone(),
                        });
                    }
                }
                let handle = Token::new_sequence_handle(start, step);
                self.sequences.insert(name.clone(), handle);
            }
            other => {
                return Err(ParseError::UnknownSpecialTokenType {
                    line,
                    kind: other.to_string(),
                })
            }
        }
        self.expect_newline()?;
        self.defined.insert(name, line);
        Ok(())
    }

    fn parse_arglist(&mut self) -> Result<HashMap<String, ArgVal>, ParseError> {
        let mut out = HashMap::new();
        loop {
            let line = self.line();
            let key = self.expect_ident()?;
            self.expect_char(':')?;
            let value = match self.advance() {
                Tok::Ident(s) => ArgVal::Ident(s),
                Tok::Str(s) => ArgVal::Str(s),
                Tok::Int(v) => ArgVal::Int(v),
                other => {
                    return Err(ParseError::InvalidArgumentValue {
                        line,
                        arg: key,
                        value: format!("{:?}", other),
                    })
                }
            };
            out.insert(key, value);
            if matches!(self.peek(), Tok::Char(',')) {
                self.advance();
                // The newline between args is optional in practice: format
                // authors commonly put several `key:value` pairs on one
                // physical line separated only by `, `.
                if matches!(self.peek(), Tok::Newline) {
                    self.advance();
                }
                continue;
            }
            break;
        }
        Ok(out)
    }

    fn parse_scope(&mut self) -> Result<TokenRef, ParseError> {
        let first = self.parse_term()?;
        let mut branches = vec![atoms_to_token(first, self.line())?];
        while matches!(self.peek(), Tok::Char('|')) {
            self.advance();
            let term = self.parse_term()?;
            branches.push(atoms_to_token(term, self.line())?);
        }
        if branches.len() == 1 {
            Ok(branches.into_iter().next().unwrap())
        } else {
            Ok(Token::one(branches))
        }
    }

    fn parse_term(&mut self) -> Result<Vec<TokenRef>, ParseError> {
        let mut atoms = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Char(',') if matches!(self.peek_at(1), Tok::Newline) => {
                    self.advance();
                    self.advance();
                    continue;
                }
                Tok::Ident(_)
                | Tok::Int(_)
                | Tok::Str(_)
                | Tok::Char('(')
                | Tok::Char('?')
                | Tok::Char('+')
                | Tok::Char('*')
                | Tok::Char('$') => {
                    atoms.push(self.parse_atom()?);
                }
                _ => break,
            }
        }
        Ok(atoms)
    }

    fn parse_atom(&mut self) -> Result<TokenRef, ParseError> {
        let line = self.line();
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                self.used.entry(name.clone()).or_insert(line);
                Ok(self.placeholder(&name))
            }
            Tok::Int(v) => {
                self.advance();
                Ok(Token::const_int(v))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Token::const_str(s))
            }
            Tok::Char('(') => {
                self.advance();
                let scope = self.parse_scope()?;
                self.expect_char(')')?;
                Ok(scope)
            }
            Tok::Char('?') => {
                self.advance();
                self.expect_char('(')?;
                let scope = self.parse_scope()?;
                self.expect_char(')')?;
                Ok(Token::optional(scope))
            }
            Tok::Char(q @ ('+' | '*')) => {
                self.advance();
                let (from, to) = self.parse_repeat_bounds(q)?;
                self.expect_char('(')?;
                let scope = self.parse_scope()?;
                self.expect_char(')')?;
                Ok(Token::repeat(scope, from, to))
            }
            Tok::Char('$') => self.parse_attribute(),
            other => Err(ParseError::ExpectRune {
                line,
                expected: 'a',
                found: tok_char(&other),
            }),
        }
    }

    fn parse_repeat_bounds(&mut self, quant: char) -> Result<(usize, usize), ParseError> {
        let default_from = if quant == '*' { 0 } else { 1 };
        if let Tok::Int(_) = self.peek() {
            let k = self.expect_int()? as usize;
            if matches!(self.peek(), Tok::Char(',')) {
                self.advance();
                if let Tok::Int(_) = self.peek() {
                    let l = self.expect_int()? as usize;
                    Ok((k, l))
                } else {
                    Ok((k, self.max_repeat))
                }
            } else {
                Ok((k, k))
            }
        } else {
            Ok((default_from, self.max_repeat))
        }
    }

    fn parse_attribute(&mut self) -> Result<TokenRef, ParseError> {
        let line = self.line();
        self.expect_char('$')?;
        let name = self.expect_ident()?;
        self.expect_char('.')?;
        let attr = self.expect_ident()?;
        self.used.entry(name.clone()).or_insert(line);

        if let Some(seq) = self.sequences.get(&name).cloned() {
            return match attr.as_str() {
                "Next" => Ok(Token::sequence_item(seq)),
                "Existing" => Ok(Token::sequence_existing_item(seq)),
                "Reset" => Ok(Token::sequence_reset_item(seq)),
                other => Err(ParseError::UnknownTokenAttribute {
                    line,
                    name,
                    attr: other.to_string(),
                }),
            };
        }

        if let Some(tok) = self.symtab.get(&name).cloned() {
            if !self.defined.contains_key(&name) {
                return Err(ParseError::TokenNotDefined { line, name });
            }
            return match attr.as_str() {
                "Count" => Ok(Token::count_of(tok)),
                "Unique" => Ok(Token::unique_of(&tok)),
                other => Err(ParseError::UnknownTokenAttribute {
                    line,
                    name,
                    attr: other.to_string(),
                }),
            };
        }

        Err(ParseError::TokenNotDefined { line, name })
    }

    fn check_completion(&mut self) -> Result<TokenRef, ParseError> {
        for (name, line) in self.used.clone() {
            if !self.defined.contains_key(&name) {
                return Err(ParseError::TokenNotDefined { line, name });
            }
        }
        for name in self.defined.keys() {
            if name != "START" && !self.used.contains_key(name) {
                return Err(ParseError::UnusedToken { name: name.clone() });
            }
        }
        self.symtab
            .get("START")
            .cloned()
            .ok_or(ParseError::NoStart)
    }
}

enum ArgVal {
    Ident(String),
    Str(String),
    Int(i64),
}

fn as_int(v: &ArgVal, arg: &str, line: usize) -> Result<i64, ParseError> {
    match v {
        ArgVal::Int(i) => Ok(*i),
        ArgVal::Ident(s) | ArgVal::Str(s) => Err(ParseError::InvalidArgumentValue {
            line,
            arg: arg.to_string(),
            value: s.clone(),
        }),
    }
}

fn tok_char(t: &Tok) -> Option<char> {
    match t {
        Tok::Char(c) => Some(*c),
        Tok::Newline => Some('\n'),
        _ => None,
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false)
}

fn atoms_to_token(atoms: Vec<TokenRef>, line: usize) -> Result<TokenRef, ParseError> {
    if atoms.is_empty() {
        return Err(ParseError::EmptyTokenDefinition {
            line,
            name: String::new(),
        });
    }
    if atoms.len() == 1 {
        Ok(atoms.into_iter().next().unwrap())
    } else {
        Ok(Token::all(atoms))
    }
}

fn patch_empty_name(err: ParseError, name: &str) -> ParseError {
    match err {
        ParseError::EmptyTokenDefinition { line, .. } => ParseError::EmptyTokenDefinition {
            line,
            name: name.to_string(),
        },
        other => other,
    }
}

/// Swap `body`'s contents into `placeholder` in place, preserving
/// `placeholder`'s `Arc` identity so every existing reference to it observes
/// the completed definition (spec.md §9's forward-reference trick).
fn swap_into_placeholder(placeholder: &TokenRef, body: &TokenRef, name: &str) {
    if crate::token::ptr_eq(placeholder, body) {
        placeholder.lock().unwrap().name = Some(name.to_string());
        return;
    }
    let kind = std::mem::replace(&mut body.lock().unwrap().kind, TokenKind::ConstStr(String::new()));
    let mut p = placeholder.lock().unwrap();
    p.kind = kind;
    p.name = Some(name.to_string());
}
