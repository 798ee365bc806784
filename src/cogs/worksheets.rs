use chrono::Utc;
use poise::CreateReply;
use serenity::all::{Attachment, CreateAttachment};

use crate::discord::commands::{Context, Error};
use crate::utils::now_in_my_timezone;
use crate::worksheets::{graded_filename, question_count, validate as grade, worksheet_filename, Operation, Worksheet, WorksheetError};

/// Generate a worksheet, or grade a filled one with `validate`.
#[poise::command(prefix_command, slash_command, track_edits)]
pub async fn worksheets(
    ctx: Context<'_>,
    #[description = "add, sub, mul or div"] operation: Option<Operation>,
    #[description = "Number of questions"] questions: Option<i64>,
    #[description = "Grade the attached worksheet"]
    #[flag]
    validate: bool,
    #[description = "Filled worksheet"] submission: Option<Attachment>,
) -> Result<(), Error> {
    let config = &ctx.data().config.worksheets;

    if validate {
        let submission = submission.ok_or(WorksheetError::NoAttachment)?;
        let contents = submission.download().await?;
        let graded = grade(operation, &contents)?;
        tracing::info!("Graded {} for {}: {}/{}", submission.filename, ctx.author().name, graded.success, graded.total);

        let attachment = CreateAttachment::bytes(graded.contents, graded_filename(&submission.filename));
        ctx.send(CreateReply::default().content(format!("Results: {}/{}", graded.success, graded.total)).attachment(attachment)).await?;
        return Ok(());
    }

    let count = question_count(questions.unwrap_or(config.questions as i64))?;
    let operation = operation.unwrap_or(config.operation);
    let worksheet = {
        let mut rng = rand::thread_rng();
        Worksheet::generate(operation, count, &mut rng)
    };

    let today = now_in_my_timezone(config.utc_offset_hours).map(|now| now.date_naive()).unwrap_or_else(|| Utc::now().date_naive());
    let filename = worksheet_filename(today);
    if let Some(dir) = &config.archive_dir {
        if let Err(e) = worksheet.archive(dir, &filename) {
            tracing::warn!("Failed to archive worksheet {}: {}", filename, e);
        }
    }

    tracing::info!("Sending a {} worksheet with {} questions to {}", worksheet.operation, worksheet.questions.len(), ctx.author().name);
    ctx.send(CreateReply::default().attachment(CreateAttachment::bytes(worksheet.blank(), filename))).await?;
    Ok(())
}
