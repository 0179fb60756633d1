use crate::coords::{parse_human, Move};
use crate::position::{Color, Position, RulesError};

fn mv(s: &str, size: usize) -> Move {
    parse_human(s, size).unwrap()
}

fn play_all(mut pos: Position, moves: &[&str]) -> Position {
    let size = pos.size();
    for m in moves {
        pos = pos.play_move(mv(m, size)).unwrap();
    }
    pos
}

#[test]
fn new_rejects_bad_sizes() {
    assert_eq!(Position::new(1, 7.5), Err(RulesError::BadSize(1)));
    assert_eq!(Position::new(26, 7.5), Err(RulesError::BadSize(26)));
    assert!(Position::new(19, 7.5).is_ok());
}

#[test]
fn empty_board_everything_is_legal() {
    let pos = Position::new(9, 7.5).unwrap();
    let legal = pos.legal_moves();
    assert_eq!(legal.len(), 82);
    assert!(legal.iter().all(|&ok| ok));
    assert_eq!(pos.to_play(), Color::Black);
}

#[test]
fn turn_alternates_and_move_count_advances() {
    let pos = Position::new(9, 7.5).unwrap();
    let pos = play_all(pos, &["E5", "pass"]);
    assert_eq!(pos.n(), 2);
    assert_eq!(pos.to_play(), Color::Black);
    assert_eq!(pos.stone_at(mv("E5", 9).to_index(9)), Some(Color::Black));
}

#[test]
fn occupied_point_is_illegal() {
    let pos = play_all(Position::new(9, 7.5).unwrap(), &["E5"]);
    let p = mv("E5", 9);
    assert!(!pos.is_move_legal(p));
    assert!(matches!(pos.play_move(p), Err(RulesError::Occupied(_))));
}

#[test]
fn single_stone_capture_removes_it_and_counts() {
    // White stone at A1 (bottom-left corner) captured by B2-less approach: B at A2 and B1.
    let pos = play_all(Position::new(5, 0.5).unwrap(), &["A2", "A1", "B1"]);
    assert_eq!(pos.stone_at(mv("A1", 5).to_index(5)), None);
    assert_eq!(pos.captures(Color::Black), 1);
}

#[test]
fn suicide_is_illegal() {
    // Black stones at A2 and B1; White to play A1 would have no liberties.
    let pos = Position::new(5, 0.5)
        .unwrap()
        .with_stone(mv("A2", 5).to_index(5), Color::Black)
        .with_stone(mv("B1", 5).to_index(5), Color::Black)
        .with_to_play(Color::White);
    let a1 = mv("A1", 5);
    assert!(!pos.is_move_legal(a1));
    assert!(matches!(pos.play_move(a1), Err(RulesError::Suicide(_))));
    assert!(!pos.legal_moves()[a1.to_index(5)]);
}

#[test]
fn capture_beats_suicide() {
    // White A1 is in atari; Black playing A2 has no liberties of its own except by capturing.
    let pos = Position::new(5, 0.5)
        .unwrap()
        .with_stone(mv("A1", 5).to_index(5), Color::White)
        .with_stone(mv("B1", 5).to_index(5), Color::Black)
        .with_stone(mv("A3", 5).to_index(5), Color::White)
        .with_stone(mv("B2", 5).to_index(5), Color::White)
        .with_to_play(Color::Black);
    // A2 touches A1(W), A3(W), B2(W): only legal because it captures A1.
    let next = pos.play_move(mv("A2", 5)).unwrap();
    assert_eq!(next.stone_at(mv("A1", 5).to_index(5)), None);
}

#[test]
fn simple_ko_forbids_immediate_recapture() {
    // Classic ko shape around C3/D3 on a 5x5 board.
    //   B . W
    // B W . W
    //   B W
    let size = 5;
    let at = |s: &str| mv(s, size).to_index(size);
    let pos = Position::new(size, 0.5)
        .unwrap()
        .with_stone(at("B3"), Color::Black)
        .with_stone(at("C4"), Color::Black)
        .with_stone(at("C2"), Color::Black)
        .with_stone(at("C3"), Color::White)
        .with_stone(at("D4"), Color::White)
        .with_stone(at("D2"), Color::White)
        .with_stone(at("E3"), Color::White)
        .with_to_play(Color::Black);

    // Black captures at D3.
    let pos = pos.play_move(mv("D3", size)).unwrap();
    assert_eq!(pos.stone_at(at("C3")), None);
    assert_eq!(pos.ko(), Some(at("C3")));

    // White may not retake immediately.
    assert!(!pos.is_move_legal(mv("C3", size)));
    assert!(matches!(pos.play_move(mv("C3", size)), Err(RulesError::Ko(_))));

    // After an exchange elsewhere the ko is lifted.
    let pos = play_all(pos, &["A5", "A1"]);
    assert_eq!(pos.ko(), None);
    assert!(pos.is_move_legal(mv("C3", size)));
}

#[test]
fn two_passes_end_the_game() {
    let pos = Position::new(9, 7.5).unwrap();
    let pos = play_all(pos, &["pass"]);
    assert!(!pos.is_game_over());
    let pos = play_all(pos, &["pass"]);
    assert!(pos.is_game_over());
    assert_eq!(pos.play_move(Move::Pass), Err(RulesError::GameOver));
    assert!(pos.legal_moves().iter().all(|&ok| !ok));
}

#[test]
fn a_stone_between_passes_resets_the_counter() {
    let pos = play_all(Position::new(9, 7.5).unwrap(), &["pass", "E5", "pass"]);
    assert!(!pos.is_game_over());
}

#[test]
fn display_marks_last_move() {
    let pos = play_all(Position::new(3, 0.5).unwrap(), &["B2"]);
    let s = pos.to_string();
    assert!(s.contains("X<"), "{s}");
    assert!(s.contains("Last: B2"), "{s}");
}
