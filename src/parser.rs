use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

struct Tokenizer<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Tokenizer<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Tokenizer::is_whitespace);
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(|c| !Tokenizer::is_whitespace(c));
		&self.line[orig .. self.i]
	}

	// The closing quote is consumed; an unterminated quote runs to end of line.
	fn read_quoted(&mut self) -> &'a [u8] {
		self.i += 1;
		let orig = self.i;
		self.proceed_while(|c| c != b'\'');
		let word = &self.line[orig .. self.i];
		if self.i < self.line.len() {
			self.i += 1;
		}
		word
	}

	fn next_token(&mut self) -> Option<&'a [u8]> {
		self.skip_whitespaces();
		match self.line.get(self.i) {
			None => None,
			Some(&b'\'') => Some(self.read_quoted()),
			Some(_) => Some(self.read_word()),
		}
	}
}

/// Splits a command line into its argument vector.
///
/// Tokens are separated by blanks. A token that starts with a single quote
/// extends to the next single quote, so `'a b'` yields one argument `a b`.
/// Pipe and redirection operators are only recognized later, and only as
/// whole tokens.
pub fn tokenize(line: &[u8]) -> Vec<OsString> {
	let mut tokenizer = Tokenizer { line, i: 0 };
	let mut args = vec![];
	while let Some(token) = tokenizer.next_token() {
		args.push(OsString::from_vec(token.to_vec()));
	}
	args
}

#[cfg(test)]
mod tests {
	use super::*;

	fn strs(args: Vec<OsString>) -> Vec<String> {
		args.into_iter().map(|a| a.into_string().unwrap()).collect()
	}

	#[test]
	fn splits_on_blanks() {
		assert_eq!(strs(tokenize(b"  echo \thello   world\n")), vec!["echo", "hello", "world"]);
	}

	#[test]
	fn blank_line_is_empty() {
		assert!(tokenize(b"   \n").is_empty());
		assert!(tokenize(b"").is_empty());
	}

	#[test]
	fn operators_are_plain_tokens() {
		assert_eq!(strs(tokenize(b"cat < in | sort > out\n")), vec!["cat", "<", "in", "|", "sort", ">", "out"]);
		assert_eq!(strs(tokenize(b"a|b")), vec!["a|b"]);
	}

	#[test]
	fn single_quotes_keep_spaces() {
		assert_eq!(strs(tokenize(b"echo 'hello  world' x\n")), vec!["echo", "hello  world", "x"]);
	}

	#[test]
	fn unterminated_quote_runs_to_end() {
		assert_eq!(strs(tokenize(b"echo 'abc def")), vec!["echo", "abc def"]);
	}
}
