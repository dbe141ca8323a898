//! Static fallback and crisis response templates.
//!
//! Used whenever generation is skipped (breaker open), fails validation
//! critically, or exhausts its retries. Every template ends with a light
//! call to action so even the worst-case reply moves the conversation.

use crate::types::DialogueState;

/// Dialogue-state-specific fallback in the user's language. Languages
/// without state templates get the generic safe fallback.
pub fn state_fallback(state: DialogueState, language: &str) -> String {
    match language {
        "ru" => state_fallback_ru(state).to_string(),
        "en" => state_fallback_en(state).to_string(),
        _ => generic_fallback(language),
    }
}

fn state_fallback_ru(state: DialogueState) -> &'static str {
    match state {
        DialogueState::SafetyCheck => {
            "Я рядом. Если вам сейчас тяжело, пожалуйста, обратитесь на линию помощи: 8-800-2000-122."
        }
        DialogueState::Escalation => {
            "Пожалуйста, обратитесь на линию помощи: 8-800-2000-122. Это бесплатно и анонимно."
        }
        DialogueState::Intake => "Давайте начнём знакомство. Как вы себя чувствуете сегодня?",
        DialogueState::Formulation => {
            "Понимаю, что вам непросто. Давайте разберёмся вместе — что сейчас беспокоит больше всего?"
        }
        DialogueState::GoalSetting => {
            "Давайте выберем, над чем поработаем сегодня. Что для вас сейчас важнее всего?"
        }
        DialogueState::ModuleSelect => "Выберите практику, которая подходит вам прямо сейчас.",
        DialogueState::Practice => "Давайте продолжим практику. Готовы к следующему шагу?",
        DialogueState::Reflection => "Как вы себя чувствуете после практики? Оцените от 1 до 10.",
        DialogueState::ReflectionLite => "Как ощущения после практики? Оцените коротко.",
        DialogueState::Homework => "Отлично. Попробуйте повторить эту практику завтра. Готовы?",
        DialogueState::SessionEnd => "Спасибо за сессию. Берегите себя, до встречи!",
    }
}

fn state_fallback_en(state: DialogueState) -> &'static str {
    match state {
        DialogueState::SafetyCheck => {
            "I'm right here. If things feel heavy right now, please reach a crisis line: 988."
        }
        DialogueState::Escalation => {
            "Please reach out to a crisis line: 988 (US) or text HOME to 741741. It's free and confidential."
        }
        DialogueState::Intake => "Let's get to know each other. How are you feeling today?",
        DialogueState::Formulation => {
            "I can see this isn't easy. Let's figure it out together — what weighs on you most right now?"
        }
        DialogueState::GoalSetting => {
            "Let's choose what to work on today. What matters most to you right now?"
        }
        DialogueState::ModuleSelect => "Choose a practice that fits you right now.",
        DialogueState::Practice => "Let's continue the practice. Ready for the next step?",
        DialogueState::Reflection => "How do you feel after the practice? Rate it from 1 to 10.",
        DialogueState::ReflectionLite => "How did the practice feel? Rate it briefly.",
        DialogueState::Homework => "Great. Try repeating this practice tomorrow. Ready?",
        DialogueState::SessionEnd => "Thank you for the session. Take care, see you soon!",
    }
}

/// Generic safe fallback, the worst-case reply. Always non-empty.
pub fn generic_fallback(language: &str) -> String {
    match language {
        "ru" => "Я здесь и слушаю. Расскажи, что тебя беспокоит?",
        "es" => "Estoy aquí y escucho. Cuéntame qué te preocupa.",
        _ => "I'm here and listening. Tell me what's on your mind?",
    }
    .to_string()
}

/// Crisis response with localized hotline resources. Returned directly by
/// the pipeline when the safety gate fires, never generated.
pub fn crisis_response(language: &str) -> String {
    match language {
        "ru" => {
            "Я слышу тебя. То, что ты чувствуешь — серьёзно, и ты заслуживаешь помощи прямо сейчас.\n\n\
             Пожалуйста, позвони на линию помощи: 8-800-2000-122 (бесплатно, круглосуточно).\n\n\
             Я здесь и могу поговорить, но профессиональная помощь сейчас важнее всего."
        }
        "es" => {
            "Te escucho. Lo que sientes es serio y mereces ayuda ahora mismo.\n\n\
             Por favor llama a la línea de crisis: 024 (España) o tu línea local de ayuda.\n\n\
             Estoy aquí y puedo hablar, pero la ayuda profesional es lo más importante ahora."
        }
        _ => {
            "I hear you. What you're feeling is serious, and you deserve help right now.\n\n\
             Please call a crisis line: 988 (Suicide & Crisis Lifeline, US) or text HOME to 741741.\n\n\
             I'm here and can talk, but professional help is the most important thing right now."
        }
    }
    .to_string()
}
