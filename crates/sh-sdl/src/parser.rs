use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::ast::*;
use crate::lexer::Token;

type Span = SimpleSpan;

/// Parse error with source span.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Byte range where the parser gave up.
    pub span: std::ops::Range<usize>,
    /// Human-readable description of what was expected.
    pub message: String,
}

fn spanned<T>(node: T, span: Span) -> Spanned<T> {
    Spanned {
        node,
        span: span.into_range(),
    }
}

/// Build the source-file parser.
///
/// A file is a list of braced elements,
/// and an element body is a list of properties, nested elements and
/// descriptions separated by newlines.
fn scene_parser<'a, I>() -> impl Parser<'a, I, SourceFile, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let kw = |k: &'static str| select! { Token::Word(ref w) if w.as_str() == k => () }.labelled(k);
    let word = select! { Token::Word(w) => w }.labelled("word");
    let string_lit = select! { Token::Str(s) => s }.labelled("string");
    let integer = select! { Token::Integer(n) => n }.labelled("integer");
    let float_lit = select! { Token::Float(n) => n }.labelled("number");
    let doc_string = select! { Token::DocString(s) => s }.labelled("description");

    let nl = just(Token::Newline).repeated().to(());
    let nl1 = just(Token::Newline).repeated().at_least(1).to(());

    let value = recursive(|value| {
        let list = value
            .separated_by(just(Token::Comma).then(nl.clone()))
            .allow_trailing()
            .collect::<Vec<Spanned<Value>>>()
            .delimited_by(
                just(Token::LBracket).then(nl.clone()),
                nl.clone().then(just(Token::RBracket)),
            )
            .map(Value::List);

        choice((
            string_lit.map(Value::String),
            float_lit.map(Value::Float),
            integer.map(Value::Integer),
            kw("true").to(Value::Boolean(true)),
            kw("false").to(Value::Boolean(false)),
            list,
            word.map(Value::Identifier),
        ))
        .map_with(|v, e| spanned(v, e.span()))
        .labelled("value")
    });

    let element = recursive(|element| {
        let property = word
            .map_with(|k, e| spanned(k, e.span()))
            .then(value.clone())
            .map(|(key, value)| Statement::Property(Property { key, value }))
            .labelled("property");

        // Element before property: `model "box" {` must not be read as a
        // property whose value is "box".
        let statement = choice((
            doc_string.map(Statement::Description),
            element.map(Statement::Element),
            property,
        ))
        .map_with(|stmt, e| spanned(stmt, e.span()));

        let body = statement
            .separated_by(nl1.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(
                just(Token::LBrace).then(nl.clone()),
                nl.clone().then(just(Token::RBrace)),
            );

        word.map_with(|k, e| spanned(k, e.span()))
            .then(string_lit.map_with(|s, e| spanned(s, e.span())).or_not())
            .then(body)
            .map(|((kind, name), body)| Element { kind, name, body })
            .labelled("element")
    });

    element
        .map_with(|el, e| spanned(el, e.span()))
        .separated_by(nl1)
        .allow_trailing()
        .collect::<Vec<_>>()
        .padded_by(nl)
        .then_ignore(end())
        .map(|elements| SourceFile { elements })
}

/// Parse a token stream into an AST, or return every parse error.
pub fn parse(tokens: &[(Token, std::ops::Range<usize>)]) -> Result<SourceFile, Vec<ParseError>> {
    let token_iter = tokens
        .iter()
        .map(|(tok, span)| (tok.clone(), Span::from(span.clone())));

    let len = tokens.last().map_or(0, |(_, s)| s.end);
    let eoi: Span = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let (output, errors) = scene_parser().parse(stream).into_output_errors();

    if let Some(ast) = output
        && errors.is_empty()
    {
        return Ok(ast);
    }

    Err(errors
        .into_iter()
        .map(|e| ParseError {
            span: e.span().into_range(),
            message: e.to_string(),
        })
        .collect())
}
