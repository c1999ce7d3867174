use std::sync::LazyLock;

use regex::Regex;

const ENGLISH_BOOKS: &[&str] = &[
    "Genesis", "Exodus", "Leviticus", "Numbers", "Deuteronomy", "Joshua", "Judges", "Ruth",
    "Samuel", "Kings", "Chronicles", "Ezra", "Nehemiah", "Esther", "Job", "Psalms", "Psalm",
    "Proverbs", "Ecclesiastes", "Song of Solomon", "Song of Songs", "Isaiah", "Jeremiah",
    "Lamentations", "Ezekiel", "Daniel", "Hosea", "Joel", "Amos", "Obadiah", "Jonah", "Micah",
    "Nahum", "Habakkuk", "Zephaniah", "Haggai", "Zechariah", "Malachi", "Matthew", "Mark",
    "Luke", "John", "Acts", "Romans", "Corinthians", "Galatians", "Ephesians", "Philippians",
    "Colossians", "Thessalonians", "Timothy", "Titus", "Philemon", "Hebrews", "James", "Peter",
    "Jude", "Revelation",
];

const KOREAN_BOOKS: &[&str] = &[
    "요한복음", "마태복음", "마가복음", "누가복음", "로마서", "고린도전서", "고린도후서",
    "갈라디아서", "에베소서", "빌립보서", "골로새서", "데살로니가전서", "데살로니가후서",
    "디모데전서", "디모데후서", "디도서", "빌레몬서", "히브리서", "야고보서", "베드로전서",
    "베드로후서", "요한일서", "요한이서", "요한삼서", "유다서", "요한계시록", "창세기",
    "출애굽기", "레위기", "민수기", "신명기", "여호수아", "사사기", "룻기", "사무엘상",
    "사무엘하", "열왕기상", "열왕기하", "역대상", "역대하", "에스라", "느헤미야", "에스더",
    "욥기", "시편", "잠언", "전도서", "아가", "이사야", "예레미야애가", "예레미야", "에스겔",
    "다니엘", "호세아", "요엘", "아모스", "오바댜", "요나", "미가", "나훔", "하박국", "스바냐",
    "학개", "스가랴", "말라기",
];

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let english = ENGLISH_BOOKS.join("|");
    let korean = KOREAN_BOOKS.join("|");
    let pattern = format!(
        r"(?:\b(?:[1-3]\s?)?(?:{english})\s+|(?:{korean})\s*)\d{{1,3}}:\d{{1,3}}(?:\s*[-–]\s*\d{{1,3}})?"
    );
    Regex::new(&pattern).expect("CITATION_RE should compile")
});

static REFERENCE_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d*\s*[가-힣A-Za-z]+\s+\d+").expect("REFERENCE_SHAPE_RE should compile")
});

/// First `book chapter:verse` citation in `text`, whitespace-normalized.
pub fn find_reference(text: &str) -> Option<String> {
    CITATION_RE
        .find(text)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Loose check used for selector candidates: a word followed by a number.
pub fn looks_like_reference(candidate: &str) -> bool {
    REFERENCE_SHAPE_RE.is_match(candidate)
}
