use chrono::{Local, Utc};

use exam_core::model::{export_papers, import_papers};
use exam_core::{Paper, Question};

use crate::app::{confirm, read_input, resolve_paper, AppContext};
use crate::cli::PaperCommand;
use crate::errors::CliError;
use crate::ui::render::truncate;
use crate::ui::{badge, header, hint, kv, print, table, Badge, Column, UiContext};

pub async fn handle_paper(ctx: &AppContext<'_>, command: &PaperCommand) -> anyhow::Result<()> {
    let app = ctx.open()?;
    let result = match command {
        PaperCommand::New {
            title,
            subtitle,
            json,
        } => {
            let mut paper = Paper::new(title, Utc::now())?;
            paper.subtitle = subtitle
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            app.store().add(&paper)?;
            app.sync.record_change()?;

            let ui = ctx.ui().with_json(*json);
            if ui.mode.is_json() {
                println!("{}", serde_json::to_string_pretty(&paper)?);
            } else if !ctx.quiet() {
                print(&ui, &badge(&ui, Badge::Ok, "Paper created"));
                print(&ui, &kv(&ui, "Id", &paper.id));
                print(&ui, &hint(&ui, &format!("exam take {}", short_id(&paper.id))));
            }
            Ok(())
        }
        PaperCommand::List { json } => {
            let papers = app.store().get_all()?;
            let ui = ctx.ui().with_json(*json);
            if ui.mode.is_json() {
                println!("{}", serde_json::to_string_pretty(&papers)?);
            } else if papers.is_empty() {
                print(&ui, "No papers yet.");
                print(&ui, &hint(&ui, "exam paper new <title>"));
            } else {
                print_paper_list(&ui, &papers);
            }
            Ok(())
        }
        PaperCommand::Show { paper, json } => {
            let paper = resolve_paper(app.store(), paper)?;
            let ui = ctx.ui().with_json(*json);
            if ui.mode.is_json() {
                println!("{}", serde_json::to_string_pretty(&paper)?);
            } else {
                print_paper(&ui, &paper);
            }
            Ok(())
        }
        PaperCommand::Delete { paper, yes } => {
            let paper = resolve_paper(app.store(), paper)?;
            if !yes {
                if !ctx.ui().is_interactive() {
                    return Err(CliError::invalid_input(
                        "Refusing to delete without confirmation; pass --yes",
                    )
                    .into());
                }
                let prompt = format!("Delete \"{}\"?", paper.title);
                let confirmed = tokio::task::spawn_blocking(move || confirm(&prompt)).await??;
                if !confirmed {
                    return Ok(());
                }
            }
            app.store().delete(&paper.id)?;
            app.sync.record_change()?;
            if !ctx.quiet() {
                let ui = ctx.ui();
                print(ui, &badge(ui, Badge::Ok, &format!("Deleted \"{}\"", paper.title)));
            }
            Ok(())
        }
        PaperCommand::Copy { paper } => {
            let original = resolve_paper(app.store(), paper)?;
            let copy = original.duplicate(Utc::now());
            app.store().add(&copy)?;
            app.sync.record_change()?;
            if !ctx.quiet() {
                let ui = ctx.ui();
                print(ui, &badge(ui, Badge::Ok, "Paper copied"));
                print(ui, &kv(ui, "Id", &copy.id));
            }
            Ok(())
        }
        PaperCommand::Export { papers, output } => {
            let selected = if papers.is_empty() {
                app.store().get_all()?
            } else {
                papers
                    .iter()
                    .map(|query| resolve_paper(app.store(), query))
                    .collect::<anyhow::Result<Vec<_>>>()?
            };
            let json = export_papers(&selected)?;
            match output.as_deref() {
                Some(path) if path != "-" => {
                    std::fs::write(path, json)
                        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path, e))?;
                    if !ctx.quiet() {
                        let ui = ctx.ui();
                        print(
                            ui,
                            &badge(ui, Badge::Ok, &format!("Exported {} papers", selected.len())),
                        );
                    }
                }
                _ => println!("{}", json),
            }
            Ok(())
        }
        PaperCommand::Import { file } => {
            let raw = read_input(file)?;
            let papers = import_papers(&raw, Utc::now())?;
            for paper in &papers {
                app.store().add(paper)?;
            }
            if !papers.is_empty() {
                app.sync.record_change()?;
            }
            if !ctx.quiet() {
                let ui = ctx.ui();
                print(
                    ui,
                    &badge(ui, Badge::Ok, &format!("Imported {} papers", papers.len())),
                );
            }
            Ok(())
        }
    };
    app.finish().await;
    result
}

/// First block of a UUID, enough to address a paper in practice.
pub fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

fn print_paper_list(ui: &UiContext, papers: &[Paper]) {
    let columns = [
        Column::new("Id"),
        Column::new("Title"),
        Column::new("Created"),
        Column::new("Questions"),
        Column::new("Score"),
    ];
    let rows: Vec<Vec<String>> = papers
        .iter()
        .map(|paper| {
            let score = paper.score();
            let title = match &paper.subtitle {
                Some(subtitle) => format!("{} ({})", paper.title, subtitle),
                None => paper.title.clone(),
            };
            vec![
                short_id(&paper.id).to_string(),
                title,
                paper
                    .created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                score.total.to_string(),
                format!("{}/{}", score.correct, score.keyed),
            ]
        })
        .collect();
    print(ui, &table(ui, &columns, &rows));
}

pub fn mark(ui: &UiContext, question: &Question) -> &'static str {
    match (question.is_correct(), question.is_incorrect(), ui.unicode) {
        (true, _, true) => "\u{2713}",
        (true, _, false) => "ok",
        (_, true, true) => "\u{2717}",
        (_, true, false) => "x",
        _ => "",
    }
}

pub fn print_paper(ui: &UiContext, paper: &Paper) {
    print(ui, &header(ui, "paper", Some(&paper.title)));
    print(ui, &kv(ui, "Id", &paper.id));
    if let Some(subtitle) = &paper.subtitle {
        print(ui, &kv(ui, "Subtitle", subtitle));
    }
    print(
        ui,
        &kv(
            ui,
            "Created",
            &paper
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        ),
    );

    let columns = [
        Column::new("#"),
        Column::new("Type"),
        Column::new("Star"),
        Column::new("Answer"),
        Column::new("Key"),
        Column::new("Mark"),
        Column::new("Opt"),
        Column::new("Memo"),
    ];
    let width = (ui.width / 5).max(12);
    let rows: Vec<Vec<String>> = paper
        .graded_questions()
        .iter()
        .enumerate()
        .map(|(i, q)| {
            vec![
                (i + 1).to_string(),
                q.kind.as_str().to_string(),
                if q.starred { "*" } else { "" }.to_string(),
                truncate(&q.user_answer, width),
                truncate(&q.correct_answer, width),
                mark(ui, q).to_string(),
                q.selected_option
                    .map(|o| o.as_str().to_string())
                    .unwrap_or_default(),
                truncate(&q.memo, width),
            ]
        })
        .collect();
    if rows.is_empty() {
        print(ui, "No questions answered yet.");
    } else {
        print(ui, &table(ui, &columns, &rows));
    }
}
