//! Reserved-name tables bundled with the validator.

/// Host-language keywords a handler name may not collide with, bilingual.
pub const RESERVED_KEYWORDS: &[&str] = &[
    // procedure grammar
    "Процедура", "Функция", "КонецПроцедуры", "КонецФункции",
    "Procedure", "Function", "EndProcedure", "EndFunction",
    // conditionals
    "Если", "Тогда", "Иначе", "ИначеЕсли", "КонецЕсли",
    "If", "Then", "Else", "ElsIf", "EndIf",
    // loops
    "Для", "Каждого", "Из", "По", "Цикл", "КонецЦикла", "Пока",
    "For", "Each", "In", "To", "Do", "While", "EndDo",
    // exceptions
    "Попытка", "Исключение", "КонецПопытки", "ВызватьИсключение",
    "Try", "Except", "EndTry", "Raise",
    // control flow
    "Прервать", "Продолжить", "Возврат",
    "Break", "Continue", "Return",
    // literals and declarations
    "Новый", "Неопределено", "Истина", "Ложь", "NULL",
    "New", "Undefined", "True", "False",
    "Экспорт", "Знач", "Перем",
    "Export", "Val", "Var",
    // operators
    "И", "Или", "Не",
    "And", "Or", "Not",
    // dynamic execution
    "Выполнить", "Вычислить", "Execute", "Eval",
    "Перейти", "Goto",
];

/// Built-in form methods a handler name may not shadow.
pub const FORM_BUILTIN_METHODS: &[&str] = &[
    "Закрыть", "Close",
    "Открыть", "Open",
    "ОткрытьМодально", "OpenModal",
    "Модифицированность", "Modified",
    "ПолучитьФорму", "GetForm",
    "Активизировать", "Activate",
    "ОбновитьОтображениеДанных", "RefreshDataRepresentation",
    "ПоказатьЗначение", "ShowValue",
    "ПоказатьВводЧисла", "ShowInputNumber",
    "ПоказатьВводДаты", "ShowInputDate",
    "ПоказатьВводСтроки", "ShowInputString",
    "УстановитьВидимость", "SetVisible",
    "УстановитьДоступность", "SetEnabled",
];

/// Platform metadata collections; a user-visible entity name colliding with
/// one of these would shadow the platform registry.
pub const METADATA_COLLECTIONS: &[&str] = &[
    "Catalogs",
    "Documents",
    "DocumentJournals",
    "Enums",
    "Reports",
    "DataProcessors",
    "Constants",
    "InformationRegisters",
    "AccumulationRegisters",
    "CalculationRegisters",
    "AccountingRegisters",
    "ChartsOfAccounts",
    "ChartsOfCharacteristicTypes",
    "ChartsOfCalculationTypes",
    "ExchangePlans",
    "BusinessProcesses",
    "Tasks",
    "CommonModules",
    "SessionParameters",
    "Справочники",
    "Документы",
    "Перечисления",
    "Отчеты",
    "Обработки",
    "Константы",
    "РегистрыСведений",
    "РегистрыНакопления",
];

fn contains_ci(table: &[&str], name: &str) -> bool {
    let lowered = name.to_lowercase();
    table.iter().any(|entry| entry.to_lowercase() == lowered)
}

pub fn is_reserved_keyword(name: &str) -> bool {
    contains_ci(RESERVED_KEYWORDS, name)
}

pub fn is_builtin_form_method(name: &str) -> bool {
    contains_ci(FORM_BUILTIN_METHODS, name)
}

pub fn is_metadata_collection(name: &str) -> bool {
    contains_ci(METADATA_COLLECTIONS, name)
}
