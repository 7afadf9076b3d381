//! Handler for the `dyntype explain` subcommand.

use crate::diagnostics::error_codes;

use super::CliError;

pub(super) fn run_explain(code: &str) -> Result<(), CliError> {
    let code = code.trim().to_ascii_uppercase();
    match get_error_explanation(&code) {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => {
            eprintln!("Valid error codes:");
            for (known, title) in error_codes::ALL {
                eprintln!("  {known}  {title}");
            }
            Err(CliError::UnknownCode(code))
        }
    }
}

/// Get a detailed explanation for an error code.
pub fn get_error_explanation(code: &str) -> Option<&'static str> {
    let explanation = match code {
        // Syntax errors
        "E0001" => {
            r#"E0001: Unexpected token

The parser found a token that does not fit the grammar at that point.

Example:
  def f(x)
      return x     # missing ':' after the parameter list

Fix: Check for a missing colon, parenthesis or operand near the
reported column.
"#
        }
        "E0002" => {
            r#"E0002: Unterminated string literal

A string was opened but its closing quote never appears on the same
line (or, for triple-quoted strings, anywhere in the file).

Example:
  name = "Ada

Fix: Add the matching closing quote.
"#
        }
        "E0003" => {
            r#"E0003: Invalid numeric literal

A number could not be read, usually because it is too large for a
64-bit integer or has a malformed exponent.

Example:
  big = 99999999999999999999999

Fix: Use a smaller value or write it as a float.
"#
        }
        "E0004" => {
            r#"E0004: Inconsistent indentation

A line dedents to a column that does not match any enclosing block.

Example:
  if x:
          y = 1
      z = 2        # matches neither the `if` nor its body

Fix: Indent every line of a block by the same amount.
"#
        }
        "E0008" => {
            r#"E0008: Unexpected end of file

The file ended in the middle of a statement or expression.

Example:
  total = (1 +

Fix: Complete the expression or close the open bracket.
"#
        }
        "E0100" => {
            r#"E0100: Source file could not be read

The file does not exist, is not readable or is not valid UTF-8.

Fix: Check the path and the file's permissions and encoding.
"#
        }

        // Type errors
        "E1001" => {
            r#"E1001: Incompatible types

Two uses of the same value require different types. This covers
operators applied to unsupported operands, a variable assigned values
of two types, a function returning two types and calls on values that
are not callable.

Example:
  x = 5 + "string"    # int + str is not defined

  y = 1
  y = "one"           # y was already an int

Fix: Convert one side explicitly (e.g. str(5)) or use a separate
variable for each type.
"#
        }
        "E1002" => {
            r#"E1002: Unknown identifier

A name was used that is not bound in the current scope, any enclosing
function or the module, and is not a builtin. Names defined in a class
body are not visible from its methods without `self.`.

Example:
  def area():
      return width * 2    # `width` is never assigned

Fix: Assign the name before use, fix the spelling, or access class
members through `self`.
"#
        }
        "E1007" => {
            r#"E1007: Wrong number of arguments

A function was called with fewer arguments than its required
parameters or more arguments than it has parameters.

Example:
  def add(a, b):
      return a + b
  add(1)              # expected 2 arguments, got 1

Fix: Pass one argument per parameter. Parameters with defaults may be
left out.
"#
        }
        "E1016" => {
            r#"E1016: Argument type mismatch

An argument's type does not match the type of its parameter. For
annotated functions the parameter type comes from the annotation; for
the rest it is inferred from the function body and earlier calls.

Example:
  def add_3(num1: int, num2: int, num3: int) -> int:
      return num1 + num2 + num3
  add_3(1, "bob", 1.0)

Fix: Pass arguments of the listed types, or convert them first.
"#
        }
        _ => return None,
    };
    Some(explanation)
}
