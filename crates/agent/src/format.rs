//! Shared user-facing message formatting. The fast path and the full
//! dispatcher render identical copy for the same backend data.

use joey_core::api::{
    Balance, CancellationReceipt, CoworkingDay, LedgerEntry, RewardItem, TaskSummary,
};

const MAX_LISTED_TASKS: usize = 10;

pub fn balance_message(balance: &Balance) -> String {
    format!(
        "G'day mate! Here's your points summary:\n\n\
         💰 *Current Balance:* {} points\n\
         📈 *Lifetime Earned:* {} points\n\
         Nice work! Check out `@Joey points earn` to get more! 🦘",
        balance.balance, balance.lifetime_earned
    )
}

pub fn task_list_message(tasks: &[TaskSummary]) -> String {
    if tasks.is_empty() {
        return "No open tasks at the moment. Check back soon! 🦘".to_owned();
    }
    let mut lines = vec!["📋 *Open Tasks:*".to_owned()];
    for task in tasks.iter().take(MAX_LISTED_TASKS) {
        lines.push(format!(
            "• *#{}* - {} ({} pts) 📂 {}",
            task.id, task.title, task.points, task.portfolio
        ));
    }
    lines.push("\nTo claim one, just say `@Joey claim task <ID>`".to_owned());
    lines.join("\n")
}

pub fn reward_list_message(rewards: &[RewardItem]) -> String {
    if rewards.is_empty() {
        return "No rewards available right now.".to_owned();
    }
    let mut lines = vec!["🎁 *Rewards Menu:*".to_owned()];
    for reward in rewards {
        lines.push(format!("• *{}* - {} ({} pts)", reward.code, reward.name, reward.cost_points));
    }
    lines.push("\nAsk me to `redeem <code>` to claim one!".to_owned());
    lines.join("\n")
}

pub fn booking_message(date: &str, points_cost: i64) -> String {
    let unit = if points_cost == 1 { "point" } else { "points" };
    format!("You beauty! 🎉\nBooked you in for *{date}*. Cost: {points_cost} {unit}.")
}

pub fn cancellation_message(date: &str, receipt: &CancellationReceipt) -> String {
    format!(
        "No worries, cancelled your booking for {date}. Refunded {} points.",
        receipt.refund_amount
    )
}

pub fn history_message(entries: &[LedgerEntry]) -> String {
    if entries.is_empty() {
        return "No points activity yet. Check `@Joey points earn` to get started!".to_owned();
    }
    let mut lines = vec!["🧾 *Recent activity:*".to_owned()];
    for entry in entries {
        let sign = if entry.points >= 0 { "+" } else { "" };
        lines.push(format!("• {sign}{}: {}", entry.points, entry.reason));
    }
    lines.join("\n")
}

pub fn availability_message(days: &[CoworkingDay]) -> String {
    if days.is_empty() {
        return "No coworking availability in the next week, sorry!".to_owned();
    }
    let mut lines = vec!["🏢 *Coworking availability:*".to_owned()];
    for day in days {
        lines.push(format!("• {}: {} spots", day.date, day.spots_available));
    }
    lines.push("\nSay `@Joey coworking book today` to grab one.".to_owned());
    lines.join("\n")
}

pub fn upstream_apology() -> String {
    "Sorry mate, having trouble connecting to the points system right now. Try again in a tic!"
        .to_owned()
}
