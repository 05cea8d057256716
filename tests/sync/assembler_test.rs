// Sync Assembler Tests
// Tests for collecting the bracketed balances and ledger streams

use meshledger::identity::Identity;
use meshledger::sync::{AssemblyError, Bracket, BracketState, SyncAssembler};

fn id(name: &str) -> Identity {
    Identity::parse(name).unwrap()
}

// ============================================================================
// RELEASE
// ============================================================================

#[test]
fn test_release_after_both_brackets() {
    let mut asm = SyncAssembler::new();

    asm.open_balances();
    asm.push_balance(id("alice"), 70).unwrap();
    asm.push_balance(id("bob"), 130).unwrap();
    assert!(asm.close_balances().is_none());
    assert_eq!(asm.balances_state(), BracketState::Complete);

    asm.open_ledger();
    asm.push_ledger("line one".to_string()).unwrap();
    let state = asm.close_ledger().expect("both brackets closed");

    assert_eq!(state.balances.len(), 2);
    assert_eq!(state.balances.get("bob"), Some(&130));
    assert_eq!(state.ledger, vec!["line one".to_string()]);

    // Buffers are consumed by the release
    assert_eq!(asm.buffered_balances(), 0);
    assert_eq!(asm.buffered_ledger(), 0);
    assert_eq!(asm.balances_state(), BracketState::Idle);
    assert_eq!(asm.ledger_state(), BracketState::Idle);
}

#[test]
fn test_release_with_ledger_first() {
    let mut asm = SyncAssembler::new();

    asm.open_ledger();
    asm.push_ledger("l".to_string()).unwrap();
    assert!(asm.close_ledger().is_none());

    asm.open_balances();
    asm.push_balance(id("carol"), 1).unwrap();
    let state = asm.close_balances().unwrap();

    assert_eq!(state.ledger.len(), 1);
    assert_eq!(state.balances.len(), 1);
}

#[test]
fn test_release_with_interleaved_brackets() {
    let mut asm = SyncAssembler::new();

    asm.open_balances();
    asm.open_ledger();
    asm.push_ledger("l1".to_string()).unwrap();
    asm.push_balance(id("a"), 5).unwrap();
    asm.push_ledger("l2".to_string()).unwrap();
    assert!(asm.close_ledger().is_none());
    let state = asm.close_balances().unwrap();

    assert_eq!(state.ledger, vec!["l1".to_string(), "l2".to_string()]);
}

#[test]
fn test_empty_exchange_releases_nothing() {
    let mut asm = SyncAssembler::new();

    asm.open_balances();
    assert!(asm.close_balances().is_none());
    asm.open_ledger();
    assert!(asm.close_ledger().is_none());

    // The exchange is over even though nothing was handed out
    assert_eq!(asm.balances_state(), BracketState::Idle);
    assert_eq!(asm.ledger_state(), BracketState::Idle);
}

#[test]
fn test_single_bracket_never_releases() {
    let mut asm = SyncAssembler::new();

    asm.open_balances();
    asm.push_balance(id("a"), 5).unwrap();
    assert!(asm.close_balances().is_none());
    // A stray second END does not release either
    assert!(asm.close_balances().is_none());
    assert_eq!(asm.buffered_balances(), 1);
}

#[test]
fn test_second_exchange_after_release() {
    let mut asm = SyncAssembler::new();

    for round in 0..2u64 {
        asm.open_balances();
        asm.push_balance(id("a"), round).unwrap();
        asm.close_balances();
        asm.open_ledger();
        let state = asm.close_ledger().unwrap();
        assert_eq!(state.balances.get("a"), Some(&round));
        assert!(state.ledger.is_empty());
    }
}

// ============================================================================
// ENTRIES OUTSIDE A BRACKET
// ============================================================================

#[test]
fn test_entry_without_start_rejected() {
    let mut asm = SyncAssembler::new();

    assert_eq!(
        asm.push_balance(id("a"), 1),
        Err(AssemblyError::EntryOutsideBracket(Bracket::Balances))
    );
    assert_eq!(
        asm.push_ledger("x".to_string()),
        Err(AssemblyError::EntryOutsideBracket(Bracket::Ledger))
    );
}

#[test]
fn test_entry_after_end_rejected() {
    let mut asm = SyncAssembler::new();

    asm.open_ledger();
    asm.close_ledger();
    assert!(!asm.is_open(Bracket::Ledger));
    assert!(asm.push_ledger("late".to_string()).is_err());
}

#[test]
fn test_reopen_clears_partial_buffer() {
    let mut asm = SyncAssembler::new();

    asm.open_balances();
    asm.push_balance(id("stale"), 1).unwrap();
    asm.open_balances();
    assert_eq!(asm.buffered_balances(), 0);
    assert!(asm.is_open(Bracket::Balances));
}
