use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, Ident};

const NOTE_IDENTS: [&str; 12] = [
    "C", "CSharp", "D", "DSharp", "E", "F", "FSharp", "G", "GSharp", "A", "ASharp", "B",
];

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const OCTAVE_COUNT: usize = 9;

/// MIDI note number of `C0`.
const C0_MIDI_NUMBER: u8 = 12;

fn note_to_freq(octave: usize, note: usize) -> f64 {
    const A4_NOTE_NUMBER: i32 = 9;
    const A4_OCTAVE: i32 = 4;
    const A4_FREQUENCY: f64 = 440.0;

    let n = (octave as i32 - A4_OCTAVE) * 12 + (note as i32 - A4_NOTE_NUMBER);
    A4_FREQUENCY * 2_f64.powf(n as f64 / 12.0)
}

/// A procedural macro that generates a pub enum for musical notes.
///
/// It generates notes from C0 to B8, including sharps, numbered from 0 upwards in semitones.
/// The enum can be converted from and to that index and to MIDI note numbers, gives the frequency
/// in Hz, and displays as the note name (`C#4`).
#[proc_macro]
pub fn music_notes(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    if !input.is_empty() {
        return syn::Error::new(Span::call_site(), "This macro does not take any input")
            .to_compile_error()
            .into();
    }

    let capacity = NOTE_IDENTS.len() * OCTAVE_COUNT;
    let mut all_note_idents = Vec::with_capacity(capacity);
    let mut all_note_names = Vec::with_capacity(capacity);
    let mut all_note_freqs = Vec::with_capacity(capacity);
    let mut all_note_indices = Vec::with_capacity(capacity);

    for octave in 0..OCTAVE_COUNT {
        for (i, &note_ident) in NOTE_IDENTS.iter().enumerate() {
            let note_ident = Ident::new(&format!("{}{}", note_ident, octave), Span::call_site());
            let note_name = format!("{}{}", NOTE_NAMES[i], octave);
            let freq = note_to_freq(octave, i);
            let index = (octave * NOTE_IDENTS.len() + i) as u8;
            all_note_idents.push(quote! { #note_ident });
            all_note_names.push(quote! { #note_name });
            all_note_freqs.push(quote! { #freq });
            all_note_indices.push(quote! { #index });
        }
    }

    let count = capacity as u8;

    quote!(
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum MusicalNote {
            #(#all_note_idents = #all_note_indices),*
        }

        impl MusicalNote {
            /// Number of notes, C0 through B8.
            pub const COUNT: u8 = #count;

            pub fn as_freq_hz(&self) -> f64 {
                match self {
                    #(MusicalNote::#all_note_idents => #all_note_freqs),*
                }
            }

            /// Semitones above C0.
            pub fn index(&self) -> u8 {
                *self as u8
            }

            pub fn midi_number(&self) -> u8 {
                self.index() + #C0_MIDI_NUMBER
            }

            pub fn from_index(index: u8) -> Option<Self> {
                match index {
                    #(#all_note_indices => Some(MusicalNote::#all_note_idents),)*
                    _ => None,
                }
            }

            pub fn from_midi_number(number: u8) -> Option<Self> {
                number.checked_sub(#C0_MIDI_NUMBER).and_then(Self::from_index)
            }

            pub fn name(&self) -> &'static str {
                match self {
                    #(MusicalNote::#all_note_idents => #all_note_names),*
                }
            }
        }

        impl ::std::fmt::Display for MusicalNote {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    ).into()
}

/// A procedural macro that converts a string literal representing a musical note into the corresponding `MusicalNote` enum variant.
///
/// It *does not* handle importing the `MusicalNote` enum, but assumes it has been defined using the `music_notes!()` macro and
/// is available in the current scope.
#[proc_macro]
pub fn note(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    // note!("C#4") becomes MusicalNote::CSharp4
    let input_str = parse_macro_input!(input as syn::LitStr);
    let ident_str = input_str.value().replace("#", "Sharp");
    let valid = ident_str
        .strip_suffix(|c: char| c.is_ascii_digit())
        .is_some_and(|name| NOTE_IDENTS.contains(&name));
    if !valid {
        return syn::Error::new(input_str.span(), "expected a note name like \"C#4\"")
            .to_compile_error()
            .into();
    }
    let output_ident = Ident::new(&ident_str, Span::call_site());

    quote!(
        MusicalNote::#output_ident
    ).into()
}
