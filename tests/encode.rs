//! Encoding properties checked against the wire grammar

use termreel::encode::encoder::RESET_TOKEN;
use termreel::{Color, ColorApprox, Encoder, PixelGrid};

const RED: Color = Color::new(255, 0, 0);
const BLUE: Color = Color::new(0, 0, 255);

/// Small deterministic generator so the sweeps are reproducible
struct Lcg(u64);

impl Lcg {
    fn next_u8(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 56) as u8
    }

    fn color(&mut self) -> Color {
        Color::new(self.next_u8(), self.next_u8(), self.next_u8())
    }
}

/// Split one encoded row into (color tokens, placeholder count)
fn parse_row(row: &str) -> (Vec<Color>, usize) {
    let mut tokens = Vec::new();
    let mut spaces = 0;
    let mut rest = row;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("\x1b[48;2;") {
            let end = after.find('m').expect("unterminated token");
            let parts: Vec<u8> = after[..end]
                .split(';')
                .map(|p| {
                    assert!(p == "0" || !p.starts_with('0'), "leading zero in {p}");
                    p.parse().unwrap()
                })
                .collect();
            tokens.push(Color::new(parts[0], parts[1], parts[2]));
            rest = &after[end + 1..];
        } else {
            assert!(rest.starts_with(' '), "unexpected byte in {rest:?}");
            spaces += 1;
            rest = &rest[1..];
        }
    }
    (tokens, spaces)
}

fn encode(encoder: &Encoder, rows: Vec<Vec<Color>>) -> String {
    let frame = encoder.encode(&PixelGrid::from_rows(rows)).unwrap();
    String::from_utf8(frame.into_bytes().to_vec()).unwrap()
}

#[test]
fn two_by_three_grid_matches_expected_tokens() {
    let out = encode(
        &Encoder::with_tolerance(2),
        vec![vec![RED, RED, BLUE], vec![RED, RED, RED]],
    );

    let body = out.strip_suffix("\x1b[0;0H").unwrap();
    let rows: Vec<&str> = body.split_terminator('\n').collect();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0], "\x1b[48;2;255;0;0m  \x1b[48;2;0;0;255m ");
    // colour state resets per row, so red is emitted again
    assert_eq!(rows[1], "\x1b[48;2;255;0;0m   ");
}

#[test]
fn random_frames_follow_the_grammar() {
    let mut rng = Lcg(7);
    for eps in [0u8, 1, 2, 16, 255] {
        let encoder = Encoder::with_tolerance(eps);
        let approx = ColorApprox::new(eps);
        let (height, width) = (6, 23);

        let grid: Vec<Vec<Color>> = (0..height)
            .map(|_| {
                // runs of near-identical colors mixed with jumps
                let mut row = Vec::with_capacity(width);
                let mut c = rng.color();
                for _ in 0..width {
                    if rng.next_u8() < 80 {
                        c = rng.color();
                    }
                    row.push(c);
                }
                row
            })
            .collect();

        let out = encode(&encoder, grid.clone());
        assert!(out.as_bytes().ends_with(RESET_TOKEN));
        let body = out.strip_suffix("\x1b[0;0H").unwrap();
        let rows: Vec<&str> = body.split_terminator('\n').collect();
        assert_eq!(rows.len(), height);

        for (encoded, pixels) in rows.iter().zip(&grid) {
            let (tokens, spaces) = parse_row(encoded);
            assert_eq!(spaces, width);
            assert!(tokens.len() <= width);
            assert_eq!(tokens.first(), Some(&pixels[0]));

            // replay the row: a token appears exactly where the pixel leaves
            // the tolerance of the last emitted color
            let mut expected = Vec::new();
            let mut last: Option<Color> = None;
            for &p in pixels {
                if !last.is_some_and(|l| approx.same(l, p)) {
                    expected.push(p);
                    last = Some(p);
                }
            }
            assert_eq!(tokens, expected);
        }
    }
}

#[test]
fn colors_within_eps_never_emit_a_second_token() {
    let encoder = Encoder::with_tolerance(3);
    let base = Color::new(128, 64, 32);
    let near = Color::new(130, 62, 34);
    let out = encode(&encoder, vec![vec![base, near, base, near, near]]);

    assert_eq!(out.matches("\x1b[48;2;").count(), 1);
}

#[test]
fn colors_at_eps_always_emit_a_token() {
    let encoder = Encoder::with_tolerance(3);
    let base = Color::new(128, 64, 32);
    for far in [
        Color::new(131, 64, 32),
        Color::new(128, 61, 32),
        Color::new(128, 64, 35),
    ] {
        let out = encode(&encoder, vec![vec![base, far]]);
        assert_eq!(out.matches("\x1b[48;2;").count(), 2, "{far:?}");
    }
}
