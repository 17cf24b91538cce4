//! Robustness sweep: the front half of the pipeline must never panic, no
//! matter the input.

use rune::parser::Parser;
use rune::resolver;
use rune::scanner;
use rune::token::TokenKind;

#[test]
fn pipeline_survives_random_garbage_inputs() {
    let mut seed = 0xC0FFEE1234_u64;

    for _ in 0..1_000 {
        let src = pseudo_random_source(&mut seed, 180);

        let (tokens, _errors) = scanner::scan(&src);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));

        if let Ok(stmts) = Parser::new(tokens).parse_program() {
            let _ = resolver::resolve(&stmts);
        }
    }
}

#[test]
fn scanner_line_numbers_never_decrease() {
    let mut seed = 0xBADC0DE_u64;

    for _ in 0..200 {
        let src = pseudo_random_source(&mut seed, 300);
        let (tokens, _) = scanner::scan(&src);
        let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
        assert!(
            lines.windows(2).all(|w| w[0] <= w[1]),
            "lines went backwards for {:?}",
            src
        );
    }
}

fn pseudo_random_source(seed: &mut u64, max_len: usize) -> String {
    const CHARSET: &[u8] =
        b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_ \n\t;,:+-*/!<>=(){}[]\".";

    let len = (next_u64(seed) as usize) % max_len;
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let idx = (next_u64(seed) as usize) % CHARSET.len();
        out.push(CHARSET[idx] as char);
    }
    out
}

fn next_u64(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    *seed
}
