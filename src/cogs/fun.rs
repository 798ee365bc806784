use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serenity::all::MessageCollector;

use crate::discord::commands::{Context, Error};
use crate::discord::errors::BotError;

const SYMBOLS: [(&str, &str); 4] = [("circle", "⏺️"), ("square", "⏹️"), ("triangle", "🔼"), ("arrow", "➡️")];

const CORRECT: &str = "✅";
const INCORRECT: &str = "❌";
const INVALID: &str = "❔";

pub const MIN_DIFFICULTY: i64 = 0;
pub const MAX_DIFFICULTY: i64 = 20;
const DEFAULT_DIFFICULTY: i64 = 6;

const SHOWN_FOR: Duration = Duration::from_secs(5);
const ANSWER_TIMEOUT: Duration = Duration::from_secs(120);

pub fn check_difficulty(difficulty: i64) -> Result<usize, BotError> {
    if difficulty < MIN_DIFFICULTY {
        return Err(BotError::OutOfRange { value: difficulty, comparative: "lower", bound: MIN_DIFFICULTY });
    }
    if difficulty > MAX_DIFFICULTY {
        return Err(BotError::OutOfRange { value: difficulty, comparative: "higher", bound: MAX_DIFFICULTY });
    }
    Ok(difficulty as usize)
}

pub fn generate_answer<R: Rng + ?Sized>(difficulty: usize, rng: &mut R) -> Vec<&'static str> {
    (0..difficulty).filter_map(|_| SYMBOLS.choose(rng).map(|(_, symbol)| *symbol)).collect()
}

fn without_variation(symbol: &str) -> &str {
    symbol.trim_end_matches('\u{fe0f}')
}

/// A symbol name or the symbol itself.
fn parse_word(word: &str) -> Option<&'static str> {
    SYMBOLS.iter().find(|(name, symbol)| *name == word || without_variation(symbol) == without_variation(word)).map(|(_, symbol)| *symbol)
}

/// The answer on one line, one flag per word of the response on the next.
pub fn verify_answer(response: &str, answer: &[&'static str]) -> String {
    let flags: String = response
        .to_lowercase()
        .split_whitespace()
        .enumerate()
        .map(|(index, word)| match parse_word(word) {
            Some(symbol) if answer.get(index) == Some(&symbol) => CORRECT,
            Some(_) => INCORRECT,
            None => INVALID,
        })
        .collect();

    format!("{}\n{}", answer.concat(), flags)
}

/// Remember the symbols and repeat them back.
#[poise::command(prefix_command, slash_command, track_edits)]
pub async fn memory(ctx: Context<'_>, #[description = "How many symbols, 0 to 20"] difficulty: Option<i64>) -> Result<(), Error> {
    let difficulty = check_difficulty(difficulty.unwrap_or(DEFAULT_DIFFICULTY))?;
    let answer = {
        let mut rng = rand::thread_rng();
        generate_answer(difficulty, &mut rng)
    };

    let shown = if answer.is_empty() { "Nothing to remember.".to_string() } else { answer.concat() };
    let reply = ctx.say(shown).await?;
    tokio::time::sleep(SHOWN_FOR).await;
    reply.delete(ctx).await?;

    ctx.say("What symbols were displayed? Please answer with the symbols arranged in the order that they were given.").await?;

    let received = MessageCollector::new(ctx).channel_id(ctx.channel_id()).author_id(ctx.author().id).timeout(ANSWER_TIMEOUT).await;
    match received {
        Some(received) => ctx.say(verify_answer(&received.content, &answer)).await?,
        None => ctx.say(format!("Out of time, it was\n{}", answer.concat())).await?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn difficulty_is_bounded() {
        assert_eq!(check_difficulty(0).unwrap(), 0);
        assert_eq!(check_difficulty(20).unwrap(), 20);
        assert_eq!(check_difficulty(21).unwrap_err().to_string(), "21 is higher than 20");
        assert_eq!(check_difficulty(-1).unwrap_err().to_string(), "-1 is lower than 0");
    }

    #[test]
    fn answers_use_only_known_symbols() {
        let mut rng = StdRng::seed_from_u64(7);
        let answer = generate_answer(12, &mut rng);

        assert_eq!(answer.len(), 12);
        assert!(answer.iter().all(|symbol| SYMBOLS.iter().any(|(_, known)| known == symbol)));
    }

    #[test]
    fn flags_each_word_of_the_response() {
        let answer = ["⏺️", "⏹️", "🔼"];

        assert_eq!(verify_answer("Circle  square triangle", &answer), "⏺️⏹️🔼\n✅✅✅");
        assert_eq!(verify_answer("circle arrow banana", &answer), "⏺️⏹️🔼\n✅❌❔");
        assert_eq!(verify_answer("⏺ ⏹️ 🔼 arrow", &answer), "⏺️⏹️🔼\n✅✅✅❌");
    }
}
