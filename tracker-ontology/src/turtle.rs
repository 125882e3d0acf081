//! Line-oriented Turtle statement reader
//!
//! Ontology source files are written in a regular Turtle subset: prefix
//! declarations, one predicate-object pair per line with `;` continuation,
//! `,` object lists and plain/typed literals. The reader turns a file into a
//! flat stream of `(subject, predicate, object)` statements, each tagged with
//! the line and column it came from so loaders can report precise locations.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::constants;
use crate::error::{SchemaError, SchemaResult};

static BUILTIN_PREFIXES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("rdf", constants::PREFIX_RDF),
        ("rdfs", constants::PREFIX_RDFS),
        ("xsd", constants::PREFIX_XSD),
        ("nrl", constants::PREFIX_NRL),
    ])
});

/// An object term of a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Iri(String),
    Literal {
        lexical: String,
        datatype: Option<String>,
    },
}

impl Object {
    /// The IRI value, when the object is a resource
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Object::Iri(iri) => Some(iri),
            Object::Literal { .. } => None,
        }
    }

    /// The raw lexical form
    pub fn lexical(&self) -> &str {
        match self {
            Object::Iri(iri) => iri,
            Object::Literal { lexical, .. } => lexical,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.lexical() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.lexical().parse().ok()
    }
}

/// One RDF statement with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
    pub line: u64,
    pub column: u64,
}

#[derive(Debug)]
enum Tok {
    Iri(String),
    Word(String),
    Literal {
        lexical: String,
        datatype: Option<String>,
    },
    Punct(char),
}

/// Read every statement out of a Turtle document. `source` is only used in
/// error locations.
pub fn read_statements(content: &str, source: &str) -> SchemaResult<Vec<Statement>> {
    let mut reader = Reader::new(source);
    for (index, raw_line) in content.lines().enumerate() {
        reader.process_line(raw_line, index as u64 + 1)?;
    }

    if reader.current_subject.is_some() {
        return Err(reader.error(reader.last_line, 1, "Unterminated statement at end of file"));
    }

    Ok(reader.statements)
}

struct Reader<'a> {
    source: &'a str,
    prefixes: HashMap<String, String>,
    current_subject: Option<String>,
    statements: Vec<Statement>,
    last_line: u64,
}

impl<'a> Reader<'a> {
    fn new(source: &'a str) -> Self {
        let prefixes = BUILTIN_PREFIXES
            .iter()
            .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
            .collect();

        Reader {
            source,
            prefixes,
            current_subject: None,
            statements: Vec::new(),
            last_line: 0,
        }
    }

    fn error(&self, line: u64, column: u64, message: &str) -> SchemaError {
        SchemaError::Statement {
            location: format!("{}:{}:{}", self.source, line, column),
            message: message.to_string(),
        }
    }

    fn process_line(&mut self, raw_line: &str, line_no: u64) -> SchemaResult<()> {
        self.last_line = line_no;

        let line = strip_comment(raw_line);
        let line = line.trim_end();
        if line.trim().is_empty() {
            return Ok(());
        }

        if line.trim_start().starts_with("@prefix") {
            return self.parse_prefix_declaration(line.trim(), line_no);
        }

        let tokens = self.tokenize(line, line_no)?;
        if tokens.is_empty() {
            return Ok(());
        }

        self.parse_statement_line(tokens, line_no)
    }

    fn parse_prefix_declaration(&mut self, line: &str, line_no: u64) -> SchemaResult<()> {
        let mut parts = line.split_whitespace();
        parts.next(); // @prefix

        let prefix = parts
            .next()
            .and_then(|p| p.strip_suffix(':'))
            .ok_or_else(|| self.error(line_no, 1, "Malformed @prefix: missing trailing ':'"))?;

        let namespace = parts
            .next()
            .and_then(|ns| ns.strip_prefix('<'))
            .and_then(|ns| ns.strip_suffix('>'))
            .ok_or_else(|| self.error(line_no, 1, "Malformed @prefix: namespace must be <...>"))?;

        self.prefixes
            .insert(prefix.to_string(), namespace.to_string());
        Ok(())
    }

    fn tokenize(&self, line: &str, line_no: u64) -> SchemaResult<Vec<(Tok, u64)>> {
        let mut tokens = Vec::new();
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            if chars[i].is_whitespace() {
                i += 1;
                continue;
            }

            let column = i as u64 + 1;

            match chars[i] {
                '<' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end] != '>' {
                        end += 1;
                    }
                    if end == chars.len() {
                        return Err(self.error(line_no, column, "Unterminated IRI reference"));
                    }
                    let iri: String = chars[start..end].iter().collect();
                    tokens.push((Tok::Iri(iri), column));
                    i = end + 1;
                }
                '"' => {
                    let (lexical, next) = self.read_string(&chars, i, line_no)?;
                    i = next;

                    let mut datatype = None;
                    if i + 1 < chars.len() && chars[i] == '^' && chars[i + 1] == '^' {
                        i += 2;
                        if i < chars.len() && chars[i] == '<' {
                            let start = i + 1;
                            let mut end = start;
                            while end < chars.len() && chars[end] != '>' {
                                end += 1;
                            }
                            if end == chars.len() {
                                return Err(self.error(line_no, column, "Unterminated datatype IRI"));
                            }
                            datatype = Some(chars[start..end].iter().collect());
                            i = end + 1;
                        } else {
                            let start = i;
                            while i < chars.len() && !chars[i].is_whitespace() {
                                i += 1;
                            }
                            let name: String = chars[start..i].iter().collect();
                            let name = name.trim_end_matches(['.', ';', ',']);
                            datatype = Some(self.expand_prefixed(name, line_no, column)?);
                            // Re-scan any terminator the datatype swallowed
                            let trailing = chars[start..i].len() - name.chars().count();
                            i -= trailing;
                        }
                    } else if i < chars.len() && chars[i] == '@' {
                        // Language tag; the bare lexical form is kept
                        while i < chars.len() && !chars[i].is_whitespace() {
                            if matches!(chars[i], '.' | ';' | ',') && i + 1 == chars.len() {
                                break;
                            }
                            i += 1;
                        }
                    }

                    tokens.push((Tok::Literal { lexical, datatype }, column));
                }
                '.' | ';' | ',' => {
                    tokens.push((Tok::Punct(chars[i]), column));
                    i += 1;
                }
                _ => {
                    let start = i;
                    while i < chars.len() && !chars[i].is_whitespace() {
                        i += 1;
                    }
                    let mut word: String = chars[start..i].iter().collect();

                    // A statement terminator may be glued to the last token
                    let mut punct = None;
                    if word.len() > 1 {
                        if let Some(last) = word.chars().last() {
                            if matches!(last, '.' | ';' | ',') {
                                word.pop();
                                punct = Some(last);
                            }
                        }
                    }

                    tokens.push((Tok::Word(word), column));
                    if let Some(p) = punct {
                        tokens.push((Tok::Punct(p), i as u64));
                    }
                }
            }
        }

        Ok(tokens)
    }

    fn read_string(
        &self,
        chars: &[char],
        start: usize,
        line_no: u64,
    ) -> SchemaResult<(String, usize)> {
        let mut value = String::new();
        let mut i = start + 1;

        while i < chars.len() {
            match chars[i] {
                '\\' if i + 1 < chars.len() => {
                    let escaped = chars[i + 1];
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        _ => escaped,
                    });
                    i += 2;
                }
                '"' => return Ok((value, i + 1)),
                c => {
                    value.push(c);
                    i += 1;
                }
            }
        }

        Err(self.error(line_no, start as u64 + 1, "Unterminated string literal"))
    }

    fn expand_prefixed(&self, name: &str, line_no: u64, column: u64) -> SchemaResult<String> {
        let (prefix, local) = name
            .split_once(':')
            .ok_or_else(|| self.error(line_no, column, &format!("Expected a resource, got '{name}'")))?;

        let namespace = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| self.error(line_no, column, &format!("Unknown prefix: {prefix}")))?;

        Ok(format!("{namespace}{local}"))
    }

    fn resource_from(&self, tok: &Tok, line_no: u64, column: u64) -> SchemaResult<String> {
        match tok {
            Tok::Iri(iri) => Ok(iri.clone()),
            Tok::Word(word) => self.expand_prefixed(word, line_no, column),
            _ => Err(self.error(line_no, column, "Expected a resource")),
        }
    }

    fn object_from(&self, tok: &Tok, line_no: u64, column: u64) -> SchemaResult<Object> {
        match tok {
            Tok::Iri(iri) => Ok(Object::Iri(iri.clone())),
            Tok::Literal { lexical, datatype } => Ok(Object::Literal {
                lexical: lexical.clone(),
                datatype: datatype.clone(),
            }),
            Tok::Word(word) => {
                if *word == "true" || *word == "false" {
                    Ok(Object::Literal {
                        lexical: word.clone(),
                        datatype: Some(constants::XSD_BOOLEAN.to_string()),
                    })
                } else if word.parse::<i64>().is_ok() {
                    Ok(Object::Literal {
                        lexical: word.clone(),
                        datatype: Some(constants::XSD_INTEGER.to_string()),
                    })
                } else {
                    Ok(Object::Iri(self.expand_prefixed(word, line_no, column)?))
                }
            }
            Tok::Punct(_) => Err(self.error(line_no, column, "Expected an object")),
        }
    }

    fn parse_statement_line(&mut self, tokens: Vec<(Tok, u64)>, line_no: u64) -> SchemaResult<()> {
        let first_column = tokens[0].1;
        let mut iter = tokens.into_iter().peekable();

        let subject = match &self.current_subject {
            Some(subject) => subject.clone(),
            None => {
                let (tok, column) = iter
                    .next()
                    .ok_or_else(|| self.error(line_no, first_column, "Expected a subject"))?;
                let subject = self.resource_from(&tok, line_no, column)?;
                self.current_subject = Some(subject.clone());
                subject
            }
        };

        let (tok, column) = iter
            .next()
            .ok_or_else(|| self.error(line_no, first_column, "Expected a predicate"))?;
        let predicate = match &tok {
            Tok::Word(word) if word == "a" => constants::RDF_TYPE.to_string(),
            _ => self.resource_from(&tok, line_no, column)?,
        };

        // One or more objects, comma separated
        loop {
            let (tok, column) = iter
                .next()
                .ok_or_else(|| self.error(line_no, first_column, "Expected an object"))?;
            let object = self.object_from(&tok, line_no, column)?;

            self.statements.push(Statement {
                subject: subject.clone(),
                predicate: predicate.clone(),
                object,
                line: line_no,
                column: first_column,
            });

            match iter.next() {
                Some((Tok::Punct('.'), _)) => {
                    self.current_subject = None;
                    break;
                }
                Some((Tok::Punct(';'), _)) => break,
                Some((Tok::Punct(','), _)) => continue,
                Some((_, column)) => {
                    return Err(self.error(line_no, column, "Expected '.', ';' or ','"));
                }
                None => {
                    return Err(self.error(line_no, first_column, "Expected '.' at end of statement"));
                }
            }
        }

        if iter.next().is_some() {
            return Err(self.error(line_no, first_column, "Trailing tokens after statement"));
        }

        Ok(())
    }
}

/// Drop a `#` comment, ignoring `#` characters inside IRI refs and strings
fn strip_comment(line: &str) -> &str {
    let mut in_iri = false;
    let mut in_string = false;
    let mut escaped = false;

    for (pos, c) in line.char_indices() {
        match c {
            '\\' if in_string => {
                escaped = !escaped;
                continue;
            }
            '"' if !in_iri && !escaped => in_string = !in_string,
            '<' if !in_string => in_iri = true,
            '>' if !in_string => in_iri = false,
            '#' if !in_iri && !in_string => return &line[..pos],
            _ => {}
        }
        escaped = false;
    }

    line
}
