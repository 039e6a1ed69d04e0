use std::time::Instant;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tracing::debug;
use crate::app::App;
use crate::controller::Submission;
use crate::state::AnalysisMode;
use crate::tui::AppEvent;

const WHEEL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(Instant::now()),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Quit
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if ctrl => app.should_quit = true,

        // Conversation actions
        KeyCode::Char('n') if ctrl => app.new_chat(),
        KeyCode::Char('y') if ctrl => {
            app.copy_latest_reply(Instant::now());
        }
        KeyCode::Tab | KeyCode::BackTab => app.controller.toggle_mode(),

        // Transcript scrolling
        KeyCode::PageUp => {
            let lines = app.half_page();
            app.scroll_up(lines);
        }
        KeyCode::PageDown => {
            let lines = app.half_page();
            app.scroll_down(lines);
        }

        // Shift+Enter, with Alt+Enter and Ctrl+J for terminals that don't report Shift
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.controller.insert_newline();
        }
        KeyCode::Char('j') if ctrl => app.controller.insert_newline(),
        KeyCode::Enter => submit(app),

        // Editing
        KeyCode::Backspace => app.controller.backspace(),
        KeyCode::Delete => app.controller.delete(),
        KeyCode::Left => app.controller.move_left(),
        KeyCode::Right => app.controller.move_right(),
        KeyCode::Home => app.controller.move_home(),
        KeyCode::End => app.controller.move_end(),
        KeyCode::Char(c) if !ctrl => app.controller.insert_char(c),

        _ => {}
    }
}

/// Enter submits the text draft in text mode and uploads the typed path in
/// CSV mode.
fn submit(app: &mut App) {
    let submission = match app.controller.mode() {
        AnalysisMode::Text => app.controller.submit_text(),
        AnalysisMode::Csv => app.controller.submit_file_path(),
    };
    if submission == Submission::Started {
        app.follow_transcript = true;
    } else {
        debug!(?submission, "enter ignored");
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::controller::RequestState;
    use crate::gateway::{CSV_ENDPOINT, TEXT_ENDPOINT};
    use crate::state::Role;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[tokio::test]
    async fn test_enter_submits_and_shift_enter_inserts_newline() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TEXT_ENDPOINT)
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "text": "Rất tốt\nnhưng hơi đắt" }),
            ))
            .with_status(200)
            .with_body(r#"{"sentiment":"neutral","clean_text":"rat tot nhung hoi dat","insight":"mixed"}"#)
            .expect(1)
            .create_async()
            .await;

        let (mut app, _, _downloads) = test_app(&server.url(), false);
        type_text(&mut app, "Rất tốt");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut app, "nhưng hơi đắt");
        assert_eq!(app.controller.input(), "Rất tốt\nnhưng hơi đắt");
        assert_eq!(app.controller.request_state(), RequestState::Idle);

        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(app.controller.request_state(), RequestState::Submitting);

        // Typing is ignored while the request is in flight
        type_text(&mut app, "x");
        assert_eq!(app.controller.input(), "");

        app.controller.wait_settled().await;
        assert_eq!(app.controller.messages().len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_enter_in_csv_mode_never_submits_text() {
        let mut server = mockito::Server::new_async().await;
        let text_mock = server
            .mock("POST", TEXT_ENDPOINT)
            .expect(0)
            .create_async()
            .await;

        let (mut app, _, _downloads) = test_app(&server.url(), false);
        type_text(&mut app, "xin chào");
        handle_event(&mut app, key(KeyCode::Tab, KeyModifiers::NONE));
        assert_eq!(app.controller.mode(), AnalysisMode::Csv);

        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT));

        assert_eq!(app.controller.request_state(), RequestState::Idle);
        assert_eq!(app.controller.input(), "xin chào");
        assert_eq!(app.controller.file_path(), "");
        assert!(app.controller.messages().is_empty());
        text_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_csv_upload_then_copy_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", CSV_ENDPOINT)
            .with_status(200)
            .with_body("comment,sentiment\nhay,positive\n")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.csv");
        std::fs::write(&path, "comment\nhay\n").unwrap();

        let (mut app, copied, downloads) = test_app(&server.url(), false);
        handle_event(&mut app, key(KeyCode::Tab, KeyModifiers::NONE));
        type_text(&mut app, &path.display().to_string());
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));
        app.controller.wait_settled().await;

        let roles: Vec<Role> = app.controller.messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        handle_event(&mut app, key(KeyCode::Char('y'), KeyModifiers::CONTROL));
        let reply = &app.controller.messages()[2];
        assert_eq!(*copied.lock().unwrap(), vec![reply.content().to_string()]);
        assert!(app.copied.is_active(reply.id(), Instant::now()));

        let saved = downloads.path().join("analyzed_reviews.csv");
        assert_eq!(std::fs::read_to_string(&saved).unwrap(), "comment,sentiment\nhay,positive\n");
        assert_eq!(app.controller.last_download(), Some(saved.as_path()));
    }

    #[test]
    fn test_new_chat_and_quit_keys() {
        let (mut app, _, _downloads) = test_app("http://127.0.0.1:1", false);
        type_text(&mut app, "draft");
        handle_event(&mut app, key(KeyCode::Char('n'), KeyModifiers::CONTROL));
        assert!(app.controller.messages().is_empty());
        assert_eq!(app.controller.input(), "draft");
        assert!(!app.should_quit);

        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }
}
