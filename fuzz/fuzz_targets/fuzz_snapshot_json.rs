#![no_main]

use flowboard_core::{BoardSnapshot, ColumnId, relocations};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(snapshot) = serde_json::from_slice::<BoardSnapshot>(data) else {
        return;
    };

    // A snapshot never relocates against itself or against nothing.
    assert!(relocations(None, &snapshot).is_empty());
    assert!(relocations(Some(&snapshot), &snapshot).is_empty());

    // Shift every card one lane over; each reported move is real.
    let mut shifted = snapshot.clone();
    for card in shifted.lanes.iter_mut().flat_map(|lane| lane.cards.iter_mut()) {
        card.col = ColumnId(card.col.0.wrapping_add(1));
    }
    let moves = relocations(Some(&snapshot), &shifted);
    assert!(moves.len() <= shifted.card_count());
    for moved in moves {
        assert_ne!(moved.from, moved.to);
        assert!(snapshot.card(&moved.card_id).is_some());
        assert!(shifted.card(&moved.card_id).is_some());
    }
});
