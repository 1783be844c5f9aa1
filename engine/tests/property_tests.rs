use proptest::prelude::*;
use sdk::errors::BotError;
use sdk::types::EventBody;
use wizzy_engine::classifier::{classify, ClassifiedInput};
use wizzy_engine::document::truncate_chars;
use wizzy_engine::memory::MemoryManager;
use wizzy_engine::orchestrator::commands::Command;
use wizzy_engine::secrets::scrub;
use wizzy_engine::session::{Modality, Session, Turn};

fn turns(contents: &[String]) -> Vec<Turn> {
    contents
        .iter()
        .enumerate()
        .map(|(i, content)| {
            if i % 2 == 0 {
                Turn::user(content.clone(), Modality::Text)
            } else {
                Turn::assistant(content.clone(), Modality::Text)
            }
        })
        .collect()
}

// History keeps the newest `max_turns` appends, in append order
proptest! {
    #[test]
    fn test_history_is_bounded_fifo(
        contents in prop::collection::vec("[a-z ]{0,12}", 0..60),
        max_turns in 1usize..25,
    ) {
        let memory = MemoryManager::new(max_turns);
        let mut session = Session::new("C1");
        let all = turns(&contents);

        for (appended, turn) in all.iter().cloned().enumerate() {
            memory.append(&mut session, turn);
            prop_assert!(session.history().len() <= max_turns);
            prop_assert_eq!(session.history().len(), (appended + 1).min(max_turns));
        }

        let keep = all.len().min(max_turns);
        prop_assert_eq!(session.history(), &all[all.len() - keep..]);
    }
}

// Replaying the same appends yields the same window
proptest! {
    #[test]
    fn test_window_is_deterministic(
        contents in prop::collection::vec("[a-z]{1,8}", 0..40),
        max_turns in 1usize..15,
    ) {
        let memory = MemoryManager::new(max_turns);
        let all = turns(&contents);

        let mut first = Session::new("C1");
        let mut second = Session::new("C1");
        for turn in &all {
            memory.append(&mut first, turn.clone());
            memory.append(&mut second, turn.clone());
        }

        prop_assert_eq!(memory.window_for(&first), memory.window_for(&second));
        prop_assert!(memory.window_for(&first).len() <= max_turns);
    }
}

// Timestamps within a history never go backwards
proptest! {
    #[test]
    fn test_history_timestamps_are_monotonic(count in 1usize..30) {
        let memory = MemoryManager::new(10);
        let mut session = Session::new("C1");
        for i in 0..count {
            memory.append(&mut session, Turn::user(format!("m{}", i), Modality::Text));
        }

        for pair in session.history().windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}

// Clipping never splits a character and never exceeds the limit
proptest! {
    #[test]
    fn test_truncate_chars_respects_boundaries(text in "\\PC{0,64}", max in 0usize..80) {
        let clipped = truncate_chars(&text, max);
        prop_assert!(text.starts_with(clipped));
        prop_assert_eq!(clipped.chars().count(), text.chars().count().min(max));
    }
}

// Every text body classifies as text, whatever it says
proptest! {
    #[test]
    fn test_plain_text_always_classifies_as_text(text in "\\PC{0,64}") {
        let classified = classify("text/plain", EventBody::Text(text.clone())).unwrap();
        prop_assert_eq!(classified, ClassifiedInput::Text(text));
    }
}

// Files of unknown top-level types are always rejected
proptest! {
    #[test]
    fn test_unknown_media_kinds_are_rejected(
        top in "(video|font|model|chemical)",
        sub in "[a-z0-9]{1,10}",
        bytes in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let result = classify(
            &format!("{}/{}", top, sub),
            EventBody::File { bytes, file_name: None, caption: None },
        );
        prop_assert!(matches!(result, Err(BotError::UnsupportedMediaKind(_))));
    }
}

// Words without a leading slash are never commands
proptest! {
    #[test]
    fn test_plain_messages_are_not_commands(text in "[a-zA-Z0-9 ,.?!]{0,40}") {
        prop_assert!(Command::parse(&text).is_none());
    }
}

// Ordinary prose passes through scrubbing untouched
proptest! {
    #[test]
    fn test_scrub_leaves_prose_alone(text in "[a-z ,.]{0,80}") {
        prop_assert_eq!(scrub(&text), text);
    }
}
