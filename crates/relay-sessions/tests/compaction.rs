//! S6 (spec.md §8): appending 21 user/assistant turns with `compactEvery =
//! 20` makes the 21st save trigger a rewrite; the file holds exactly one
//! `meta` record and `persisted_msg_count == 42`.

use relay_sessions::{ChatMessage, Session, SessionKey, SessionStore};

#[tokio::test]
async fn s6_compaction_rewrite_on_twenty_first_save() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path()).with_compaction(4 * 1024 * 1024, 20);
    let key = SessionKey::new("main", "telegram", "tg1", "100");
    let mut session = Session::new(key.clone());

    for turn in 0..21 {
        session.append(ChatMessage::user(format!("turn {turn}")));
        session.append(ChatMessage::assistant(format!("reply {turn}")));
        store.save(&mut session).await.unwrap();
    }

    assert_eq!(session.persisted_msg_count, 42);

    let reloaded = store.load(&key).await.unwrap().expect("session file must exist");
    assert_eq!(reloaded.messages.len(), 42);

    let path = {
        let mut hasher = sha1::Sha1::new();
        use sha1::Digest;
        hasher.update(key.format().as_bytes());
        dir.path().join(format!("{}.jsonl", hex::encode(hasher.finalize())))
    };
    let text = std::fs::read_to_string(path).unwrap();
    let meta_lines = text.lines().filter(|l| l.contains(r#""_type":"meta""#)).count();
    assert_eq!(meta_lines, 1);
}
