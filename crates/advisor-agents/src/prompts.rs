use advisor_models::{Domain, OperationSpec};

pub fn fundamental_instructions() -> String {
    "You are a fundamental analysis specialist with expertise in financial statement analysis, \
     valuation and peer comparison.\n\n\
     ## WHAT TO ASSESS\n\n\
     - Revenue growth: > 10% is bullish, negative growth is bearish.\n\
     - Valuation: P/E below 15 is bullish, above 30 is bearish. A premium to the sector \
     average needs superior returns to justify it.\n\
     - Profitability: ROE above the benchmark (outperforming peers) is bullish.\n\
     - Balance sheet: debt-to-equity above 1.5 is bearish.\n\
     - Analyst rating and the most recent earnings surprise (beat / miss / inline).\n\n\
     Weigh bullish and bearish factors objectively. Use `get_company_financials` first, then \
     `calculate_ratios` against the sector."
        .to_string()
}

pub fn technical_instructions() -> String {
    "You are a technical analysis specialist focused on price action, chart patterns and \
     market indicators. Avoid fundamental bias.\n\n\
     ## INTERPRETATION RULES\n\n\
     ### RSI (0-100)\n\
     - RSI < 30: oversold, bullish (bounce likely)\n\
     - RSI > 70: overbought, bearish (reversal risk)\n\
     - 30-70: neutral\n\n\
     ### Trend and moving averages\n\
     - Price above the 200-day SMA: bullish; below: bearish\n\
     - Overall trend bullish / bearish / sideways maps directly to direction\n\n\
     ### MACD and Bollinger Bands\n\
     - MACD signal bullish or bearish maps directly to direction\n\
     - Price at the lower band: bullish; at the upper band: bearish\n\n\
     Confirm signals across indicators before assigning high confidence."
        .to_string()
}

pub fn sentiment_instructions() -> String {
    "You are a sentiment analysis specialist focused on market psychology and information \
     flow.\n\n\
     ## INTERPRETATION RULES\n\n\
     Sentiment scores range from -1 (very negative) to +1 (very positive).\n\
     - Overall or news sentiment > +0.2: bullish; < -0.2: bearish\n\
     - Sentiment trend improving: bullish; deteriorating: bearish\n\
     - Social engagement above 10% amplifies whatever direction social sentiment shows\n\n\
     Note key themes and any divergence between news, social and analyst sentiment. \
     Extreme readings may be contrarian signals; say so in the narrative."
        .to_string()
}

pub fn risk_instructions() -> String {
    "You are a risk assessment specialist focused on identifying and quantifying investment \
     risks.\n\n\
     ## INTERPRETATION RULES\n\n\
     - Beta > 1.5: high market risk (bearish); 0.8-1.5: medium; < 0.8: low (bullish)\n\
     - Annualized volatility > 45%: bearish\n\
     - Daily 95% VaR worse than -12%: bearish\n\
     - Liquidity score > 0.7: bullish\n\
     - High sector or regulatory risk: bearish\n\
     - Diversification benefit > 85%: bullish; hedging required: bearish\n\n\
     Always consider tail risks. Use `portfolio_impact_analysis` with the default 5% position \
     unless told otherwise."
        .to_string()
}

/// Fixed instruction template for a domain.
pub fn instructions_for(domain: Domain) -> String {
    match domain {
        Domain::Fundamental => fundamental_instructions(),
        Domain::Technical => technical_instructions(),
        Domain::Sentiment => sentiment_instructions(),
        Domain::Risk => risk_instructions(),
    }
}

fn reply_protocol(tools_exhausted: bool) -> String {
    let report_example = serde_json::json!({
        "action": "final",
        "report": {
            "findings": [
                {
                    "metric": "<what was measured>",
                    "observation": "<one sentence>",
                    "direction": "bullish | bearish | neutral",
                    "value": "<optional number or string>"
                }
            ],
            "narrative": "<concise summary of the analysis>",
            "confidence": "0.75"
        }
    });
    let invoke_example = serde_json::json!({
        "action": "invoke_tool",
        "tool": "<operation name>",
        "params": {"ticker": "<ticker>"}
    });

    let mut protocol = String::from(
        "## REPLY PROTOCOL\n\n\
         Respond ONLY with a single JSON object, no other text.\n\n",
    );
    if tools_exhausted {
        protocol.push_str(
            "The tool budget is exhausted. You MUST now give your final answer using the \
             results already in the conversation.\n\n",
        );
    } else {
        protocol.push_str("To run an operation:\n");
        protocol.push_str(&serde_json::to_string_pretty(&invoke_example).unwrap_or_default());
        protocol.push_str("\n\n");
    }
    protocol.push_str("To finish:\n");
    protocol.push_str(&serde_json::to_string_pretty(&report_example).unwrap_or_default());
    protocol.push_str(
        "\n\n`confidence` is a decimal between 0 and 1. The conversation you receive lists \
         every operation already run and its result.",
    );
    protocol
}

/// Full system prompt: domain instructions, the operations on offer and the reply protocol.
pub fn render_system_prompt(
    instructions: &str,
    operations: &[OperationSpec],
    tools_exhausted: bool,
) -> String {
    let mut prompt = format!("{instructions}\n\n");
    if !operations.is_empty() {
        prompt.push_str("## AVAILABLE OPERATIONS\n\n");
        for op in operations {
            prompt.push_str(&format!(
                "- `{}`: {}\n  parameters: {}\n",
                op.name, op.description, op.input_schema
            ));
        }
        prompt.push('\n');
    }
    prompt.push_str(&reply_protocol(tools_exhausted));
    prompt
}
