use exam_core::model::{OptionTag, ScoreFilter};
use serde_json::json;

use crate::app::{question_index, resolve_paper, AppContext};
use crate::cli::{QuestionRef, ScoreArgs};
use crate::errors::CliError;
use crate::ui::{badge, header, kv, print, table, Badge, Column};

/// A single-question edit.
pub enum Edit<'a> {
    Answer(&'a str),
    Key(&'a str),
    Memo(&'a str),
    Choose(Option<&'a str>),
    Star,
    Kind,
}

pub async fn handle_edit(
    ctx: &AppContext<'_>,
    target: &QuestionRef,
    edit: Edit<'_>,
) -> anyhow::Result<()> {
    let app = ctx.open()?;
    let mut paper = resolve_paper(app.store(), &target.paper)?;
    let index = question_index(target.question)?;
    let number = target.question;

    let message = match edit {
        Edit::Answer(text) => {
            let appended = paper.set_user_answer(index, text)?;
            if appended {
                format!("Answered question {}; question {} added", number, number + 1)
            } else {
                format!("Answered question {}", number)
            }
        }
        Edit::Key(text) => {
            paper.set_correct_answer(index, text)?;
            let question = paper.question(index)?;
            let verdict = if question.is_correct() {
                "correct"
            } else if question.is_incorrect() {
                "incorrect"
            } else {
                "unmarked"
            };
            format!("Key set for question {} ({})", number, verdict)
        }
        Edit::Memo(text) => {
            paper.set_memo(index, text)?;
            format!("Memo saved on question {}", number)
        }
        Edit::Choose(option) => {
            let tag = match option {
                Some(raw) => Some(OptionTag::parse(raw).ok_or_else(|| {
                    CliError::invalid_input(format!("Option must be A, B or C, not {}", raw))
                })?),
                None => None,
            };
            paper.select_option(index, tag)?;
            match tag {
                Some(tag) => format!("Question {} marked {}", number, tag.as_str()),
                None => format!("Question {} option cleared", number),
            }
        }
        Edit::Star => {
            let starred = paper.toggle_starred(index)?;
            if starred {
                format!("Question {} starred", number)
            } else {
                format!("Question {} unstarred", number)
            }
        }
        Edit::Kind => {
            let kind = paper.toggle_type(index)?;
            format!("Question {} is now {}", number, kind.as_str())
        }
    };

    app.save(&paper)?;
    if !ctx.quiet() {
        let ui = ctx.ui();
        print(ui, &badge(ui, Badge::Ok, &message));
    }
    app.finish().await;
    Ok(())
}

fn score_filter(args: &ScoreArgs) -> anyhow::Result<ScoreFilter> {
    let options = args
        .options
        .iter()
        .map(|raw| match raw.trim() {
            "none" | "n" | "N" => Ok(None),
            other => OptionTag::parse(other).map(Some).ok_or_else(|| {
                CliError::invalid_input(format!("Option must be A, B, C or none, got {:?}", raw))
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ScoreFilter {
        options,
        correct: args.correct,
        wrong: args.wrong,
        starred_only: args.starred,
    })
}

pub fn handle_score(ctx: &AppContext, args: &ScoreArgs) -> anyhow::Result<()> {
    let filter = score_filter(args)?;
    let app = ctx.open()?;
    let paper = resolve_paper(app.store(), &args.paper.paper)?;
    let score = paper.score();
    let listing = args.list || !filter.is_empty();

    let ui = ctx.ui().with_json(args.paper.json);
    if ui.mode.is_json() {
        let mut value = serde_json::to_value(score)?;
        if listing {
            let questions: Vec<_> = paper
                .review(&filter)
                .map(|(index, q)| {
                    json!({
                        "number": index + 1,
                        "state": q.score_state().map(|state| state.label()),
                        "starred": q.starred,
                        "userAnswer": q.user_answer,
                        "correctAnswer": q.correct_answer,
                        "memo": q.memo,
                    })
                })
                .collect();
            value["questions"] = json!(questions);
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print(&ui, &header(&ui, "score", Some(&paper.title)));
    print(&ui, &kv(&ui, "Questions", &score.total.to_string()));
    print(&ui, &kv(&ui, "Answered", &score.answered.to_string()));
    print(&ui, &kv(&ui, "Keyed", &score.keyed.to_string()));
    print(&ui, &kv(&ui, "Correct", &score.correct.to_string()));
    print(&ui, &kv(&ui, "Incorrect", &score.incorrect.to_string()));
    if score.keyed > 0 {
        let percent = score.correct * 100 / score.keyed;
        print(&ui, &kv(&ui, "Percent", &format!("{}%", percent)));
    }

    if listing {
        let columns = [
            Column::new("No."),
            Column::new("State"),
            Column::new("Star"),
            Column::new("Answer"),
            Column::new("Key"),
            Column::new("Memo"),
        ];
        let rows: Vec<Vec<String>> = paper
            .review(&filter)
            .map(|(index, q)| {
                vec![
                    (index + 1).to_string(),
                    q.score_state().map(|state| state.label()).unwrap_or_default(),
                    if q.starred { "*" } else { "" }.to_string(),
                    q.user_answer.clone(),
                    q.correct_answer.clone(),
                    q.memo.clone(),
                ]
            })
            .collect();
        print(&ui, &table(&ui, &columns, &rows));
    }
    Ok(())
}
