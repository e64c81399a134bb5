//! Question-by-question answering and grading.
//!
//! Every edit is saved locally at once and arms the quiet-period push, so
//! a long session syncs in the background while the user types. `:s`
//! pushes immediately and `:q` leaves; whatever is still pending is pushed
//! on the way out. With a credential saved, the session unlocks and merges
//! the remote copy before the first question.

use exam_core::sync::PushOutcome;
use exam_core::VaultState;

use crate::app::{ensure_unlocked, prompt_line, resolve_paper, App, AppContext};
use crate::cli::PaperRefArgs;
use crate::errors::CliError;
use crate::ui::render::sync_status;
use crate::ui::{badge, header, hint, kv, print, Badge, UiContext};

use super::papers::{mark, print_paper};
use super::sync::print_merge_report;

const QUIT: &str = ":q";
const SAVE: &str = ":s";

enum Step {
    Quit,
    Save,
    Text(String),
}

fn parse_step(line: &str) -> Step {
    match line.trim() {
        QUIT => Step::Quit,
        SAVE => Step::Save,
        _ => Step::Text(line.to_string()),
    }
}

async fn ask(prompt: String, initial: String) -> anyhow::Result<Step> {
    let line = tokio::task::spawn_blocking(move || prompt_line(&prompt, &initial)).await??;
    Ok(parse_step(&line))
}

fn require_terminal(ui: &UiContext) -> anyhow::Result<()> {
    if ui.is_interactive() {
        Ok(())
    } else {
        Err(CliError::invalid_input(
            "This command needs a terminal; use `exam answer` or `exam key` in scripts",
        )
        .into())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum InitialLoad {
    LocalOnly,
    UnlockThenPull,
    Pull,
}

fn initial_load(state: VaultState) -> InitialLoad {
    match state {
        VaultState::Unset => InitialLoad::LocalOnly,
        VaultState::Locked => InitialLoad::UnlockThenPull,
        VaultState::Unlocked => InitialLoad::Pull,
    }
}

/// Bring the local copy up to date before the session starts.
///
/// A failed pull is reported as a notice and the session goes on with the
/// local papers.
async fn load_remote(app: &mut App, ui: &UiContext) -> anyhow::Result<()> {
    let report = match initial_load(app.vault().state()?) {
        InitialLoad::LocalOnly => return Ok(()),
        // Unlocking pulls once; a failure there is already a notice.
        InitialLoad::UnlockThenPull => ensure_unlocked(app, false).await?,
        InitialLoad::Pull => app.sync.pull().await.ok(),
    };
    if let Some(report) = report {
        print_merge_report(ui, &report);
    }
    app.show_notices();
    Ok(())
}

async fn save_now(app: &mut App, ui: &UiContext) {
    match app.sync.save_now().await {
        Ok(PushOutcome::Pushed { papers }) => {
            print(ui, &badge(ui, Badge::Ok, &format!("Pushed {} papers", papers)));
        }
        Ok(PushOutcome::Superseded) => {
            print(ui, &badge(ui, Badge::Info, "A push is running; another will follow"));
        }
        // The notice stream carries the message.
        Err(_) => {}
    }
    app.show_notices();
}

pub async fn handle_take(ctx: &AppContext<'_>, args: &PaperRefArgs) -> anyhow::Result<()> {
    let ui = ctx.ui().clone();
    require_terminal(&ui)?;
    let mut app = ctx.open()?;
    load_remote(&mut app, &ui).await?;
    let mut paper = resolve_paper(app.store(), &args.paper)?;

    print(&ui, &header(&ui, "take", Some(&paper.title)));
    print(&ui, &hint(&ui, "Enter moves on, :s saves to remote now, :q quits"));

    let mut index = 0;
    while index < paper.questions.len() {
        let question = &paper.questions[index];
        let is_trailing_blank = index + 1 == paper.questions.len() && question.is_blank();
        let prompt = format!("Q{} [{}]", index + 1, question.kind.as_str());
        let current = question.user_answer.clone();

        match ask(prompt, current.clone()).await? {
            Step::Quit => break,
            Step::Save => {
                save_now(&mut app, &ui).await;
                continue;
            }
            Step::Text(text) if text.trim().is_empty() && is_trailing_blank => break,
            Step::Text(text) => {
                if text != current {
                    paper.set_user_answer(index, &text)?;
                    app.save(&paper)?;
                }
                index += 1;
            }
        }
        app.show_notices();
    }

    app.finish().await;
    print_paper(&ui, &paper);
    Ok(())
}

pub async fn handle_grade(ctx: &AppContext<'_>, args: &PaperRefArgs) -> anyhow::Result<()> {
    let ui = ctx.ui().clone();
    require_terminal(&ui)?;
    let mut app = ctx.open()?;
    load_remote(&mut app, &ui).await?;
    let mut paper = resolve_paper(app.store(), &args.paper)?;

    print(&ui, &header(&ui, "grade", Some(&paper.title)));
    print(&ui, &hint(&ui, "Type the correct answer, :s saves to remote now, :q quits"));

    let mut index = 0;
    while index < paper.graded_questions().len() {
        let question = &paper.questions[index];
        print(&ui, &kv(&ui, &format!("Q{} answer", index + 1), &question.user_answer));
        let current = question.correct_answer.clone();

        match ask(format!("Q{} key", index + 1), current.clone()).await? {
            Step::Quit => break,
            Step::Save => {
                save_now(&mut app, &ui).await;
                continue;
            }
            Step::Text(text) => {
                if text != current {
                    paper.set_correct_answer(index, &text)?;
                    app.save(&paper)?;
                }
                let verdict = mark(&ui, &paper.questions[index]);
                if !verdict.is_empty() {
                    print(&ui, verdict);
                }
                index += 1;
            }
        }
        app.show_notices();
        print(&ui, &sync_status(&ui, &app.sync.status()));
    }

    app.finish().await;
    let score = paper.score();
    print(
        &ui,
        &badge(
            &ui,
            Badge::Info,
            &format!("{} of {} keyed answers correct", score.correct, score.keyed),
        ),
    );
    Ok(())
}
