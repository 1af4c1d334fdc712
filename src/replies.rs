//! Outbound message texts
//!
//! Every builder is pure: output depends only on the arguments.

use crate::directory::Professional;
use crate::state_machine::Selection;
use std::fmt::Write;

const DEFAULT_SPECIALTY_LABEL: &str = "Clínica General";
const ANY_PROFESSIONAL_LABEL: &str = "un profesional disponible";

pub fn main_menu(clinic_name: &str) -> String {
    format!(
        "¡Hola! Soy Dogtor 🐶, tu asistente virtual para {clinic_name}.\n\n\
         ¿Qué necesitas hacer?\n\n\
         1. Sacar un Turno 📅\n\
         2. Consultar Abono 💳\n\n\
         Escribí el número de la opción."
    )
}

pub fn appointment_type_prompt() -> String {
    "¿Cómo preferís buscar tu turno?\n\n\
     1. Por Profesional 👨‍⚕️\n\
     2. Por Especialidad 🩺\n\n\
     Escribí el número de la opción."
        .to_string()
}

pub fn professional_list(professionals: &[Professional]) -> String {
    let mut text = String::from("Elegí un profesional:\n\n");
    for (i, professional) in professionals.iter().enumerate() {
        let _ = writeln!(
            text,
            "{}. {} ({})",
            i + 1,
            professional.name,
            professional.specialties.join(", ")
        );
    }
    text.push_str("\nEscribí el número del profesional.");
    text
}

pub fn specialty_list(specialties: &[String]) -> String {
    let mut text = String::from("Elegí una especialidad:\n\n");
    for (i, specialty) in specialties.iter().enumerate() {
        let _ = writeln!(text, "{}. {specialty}", i + 1);
    }
    text.push_str("\nEscribí el número de la especialidad.");
    text
}

/// How a selection is echoed back in the confirmation prompt
pub fn selection_label(selection: &Selection) -> String {
    match selection {
        Selection::Professional(p) => format!("{} ({})", p.name, p.specialties.join(", ")),
        Selection::Specialty(s) => s.clone(),
    }
}

pub fn confirmation_prompt(label: &str) -> String {
    format!(
        "Seleccionaste: *{label}*. ¿Confirmamos?\n\n\
         1. Sí, confirmar\n\
         2. No, cancelar\n\n\
         Escribí el número."
    )
}

/// Placeholder sent when the user confirms; there is no booking backend yet
///
/// A professional with no specialties is labelled "Clínica General", whether
/// the clinic document omitted the list or gave an empty one.
pub fn booking_stub(selection: &Selection) -> String {
    let (specialty, professional) = match selection {
        Selection::Professional(p) => {
            let specialty = if p.specialties.is_empty() {
                DEFAULT_SPECIALTY_LABEL.to_string()
            } else {
                p.specialties.join("/")
            };
            (specialty, p.name.clone())
        }
        Selection::Specialty(s) => (s.clone(), ANY_PROFESSIONAL_LABEL.to_string()),
    };

    format!(
        "¡Perfecto! 👍 Buscaremos un turno para *{specialty}* con *{professional}*.\n\n\
         (Próximamente: te mostraremos los horarios disponibles)"
    )
}

pub fn membership_stub() -> String {
    "Consultas sobre abonos: Próximamente disponible. Por ahora, podés sacar un turno.".to_string()
}

pub fn cancelled() -> String {
    "Entendido. Selección cancelada.".to_string()
}

pub fn invalid_appointment_type() -> String {
    "Opción inválida. Por favor, elegí 1 o 2.".to_string()
}

pub fn invalid_list_choice() -> String {
    "Opción inválida. Por favor, elegí un número de la lista.".to_string()
}

pub fn help() -> String {
    "No entendí eso. ¿Necesitás ayuda? Escribí *Menu* para volver a empezar.".to_string()
}

pub fn apology() -> String {
    "Lo siento, ocurrió un error interno. Por favor, intenta de nuevo más tarde.".to_string()
}
