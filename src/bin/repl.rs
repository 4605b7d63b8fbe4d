use std::borrow::Cow;
use std::cell::RefCell;
use std::process;
use std::rc::Rc;

use minilisp::evaluator::{EvalError, special_form_identifiers};
use minilisp::{Environment, Error, Interpreter, TokenKind, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const PROMPT: &str = "> ";
const HISTORY_FILE: &str = "minilisp_history.txt";

struct LispCompleter {
    env: Rc<RefCell<Environment>>,
}

impl LispCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        LispCompleter { env }
    }
}

impl rustyline::completion::Completer for LispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let Ok(tokens) = tokenize(&line[..pos]) else {
            return Ok((pos, vec![]));
        };
        // Only complete an atom that ends right at the cursor
        let Some(token) = tokens.last().filter(|token| token.span.end == pos) else {
            return Ok((pos, vec![]));
        };
        let TokenKind::Atom(prefix) = &token.kind else {
            return Ok((pos, vec![]));
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .union(&special_form_identifiers())
            .filter(|id| id.starts_with(prefix.as_str()))
            .cloned()
            .collect();
        candidates.sort();
        Ok((token.span.start, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: ParenValidator,
    #[rustyline(Highlighter)]
    highlighter: ParenHighlighter,
    #[rustyline(Completer)]
    completer: LispCompleter,
}

/// Keeps reading lines until every `(` is closed.
struct ParenValidator;

impl Validator for ParenValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth = 0usize;
        for (i, c) in ctx.input().char_indices() {
            match c {
                '(' => depth += 1,
                ')' => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched ')' at position {}",
                            i
                        ))));
                    }
                },
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct ParenHighlighter;

impl Highlighter for ParenHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        // (index in `line`, index in `highlighted`) of each open paren
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut highlighted = String::new();
        let before_cursor = pos.checked_sub(1);

        for (i, c) in line.char_indices() {
            match c {
                '(' => {
                    stack.push((i, highlighted.len()));
                    highlighted.push(c);
                }
                ')' => match stack.pop() {
                    Some((open_i, matching_pos))
                        if before_cursor == Some(i) || before_cursor == Some(open_i) =>
                    {
                        highlighted.push_str("\x1b[34m)\x1b[0m"); // Blue for matching parens
                        highlighted.replace_range(matching_pos..=matching_pos, "\x1b[1;34m(\x1b[0m");
                    }
                    Some(_) => highlighted.push(c),
                    None => highlighted.push_str("\x1b[31m)\x1b[0m"), // Red for unmatched parens
                },
                _ => highlighted.push(c),
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn report(error: &Error, input: &str) {
    if error.pretty_print(input).is_err() {
        eprintln!("Error: {}", error);
    }
}

fn main() -> rustyline::Result<()> {
    println!("minilisp REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Call (exit) or press Ctrl-C to abort, Ctrl-D to quit.");

    let interpreter = match Interpreter::with_prelude() {
        Ok(interpreter) => interpreter,
        Err(e) => {
            report(&e, "");
            process::exit(1);
        }
    };

    let h = InputHelper {
        highlighter: ParenHighlighter,
        validator: ParenValidator,
        completer: LispCompleter::new(Rc::clone(interpreter.env())),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl: Editor<InputHelper, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                match interpreter.eval_str(&line) {
                    Ok(result_node) => println!("{}", result_node),
                    Err(Error::Eval(EvalError::Exit)) => {
                        rl.save_history(HISTORY_FILE)?;
                        process::exit(1);
                    }
                    // Only the current form is abandoned
                    Err(e) => report(&e, &line),
                }
            }
            Err(ReadlineError::Interrupted) => {
                rl.save_history(HISTORY_FILE)?;
                process::exit(1);
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
