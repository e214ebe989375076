use crate::normalize::normalize_word;

/// Common anglicisms and their established Russian equivalents. Keys are normalized.
const RUSSIAN_EQUIVALENTS: &[(&str, &str)] = &[
    ("апдейт", "обновление"),
    ("бренд", "торговая марка"),
    ("буллинг", "травля"),
    ("воркшоп", "мастер-класс"),
    ("геймдев", "разработка игр"),
    ("дайджест", "обзор"),
    ("дедлайн", "срок"),
    ("дизайн", "оформление, проектирование"),
    ("драйв", "энергия, азарт"),
    ("индустрия", "отрасль, сфера"),
    ("инсайт", "понимание, прозрение"),
    ("колледж", "среднее специальное учебное заведение"),
    ("комьюнити", "сообщество"),
    ("консалтинг", "консультирование"),
    ("контент", "материалы, содержимое"),
    ("креатив", "творчество"),
    ("креативити", "творчество"),
    ("креативность", "творчество"),
    ("креативный", "творческий"),
    ("лайв", "прямой эфир"),
    ("лайфхак", "полезный совет"),
    ("логин", "имя пользователя"),
    ("лук", "образ, внешний вид"),
    ("майндсет", "установка, образ мыслей"),
    ("маркетинг", "сбыт, продвижение"),
    ("менеджер", "руководитель, управляющий"),
    ("менеджмент", "управление"),
    ("ментор", "наставник"),
    ("мерч", "фирменная продукция"),
    ("моушн", "движение, анимация"),
    ("онбординг", "введение в должность"),
    ("платформа", "площадка, сервис"),
    ("подписка", "абонемент"),
    ("селфи", "фотография себя"),
    ("скилл", "навык, умение"),
    ("скролл", "прокрутка"),
    ("спойлер", "раскрытие сюжета"),
    ("сторис", "история (в соцсетях)"),
    ("трек", "направление, траектория"),
    ("триал", "пробный период"),
    ("фриланс", "удалённая работа"),
    ("фэшн", "мода"),
    ("хайлайт", "основное, главное"),
    ("чек-лист", "список проверки"),
    ("шоурум", "выставочный зал"),
    ("faq", "вопросы и ответы"),
];

const PLURAL_ENDINGS: [&str; 2] = ["ы", "и"];

/// Suggested Russian replacement for a known anglicism, also matching simple plurals.
pub fn suggest_replacement(word: &str) -> Option<&'static str> {
    let normalized = normalize_word(word)?;
    lookup(&normalized).or_else(|| {
        PLURAL_ENDINGS
            .iter()
            .find_map(|ending| normalized.strip_suffix(ending).and_then(lookup))
    })
}

fn lookup(normalized: &str) -> Option<&'static str> {
    RUSSIAN_EQUIVALENTS
        .iter()
        .find(|(anglicism, _)| *anglicism == normalized)
        .map(|(_, replacement)| *replacement)
}
